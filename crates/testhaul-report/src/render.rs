//! Render a combined HTML test report from [`TestResults`].
//!
//! The layout follows the Gradle test report: an `index.html` with one
//! `infoBox` per counter (`#tests`, `#failures`, `#ignored`, `#duration`,
//! `#successRate`), a tab per non-empty listing (`Failed tests`,
//! `Ignored tests`) followed by a `Classes` tab, and one page per test class
//! under `classes/`. Listing entries link to `classes/<class>.html#<test>`,
//! which is what [`crate::summary`] reads back.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use crate::error::ReportError;
use crate::results::{Outcome, TestCase, TestResults};

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
.infoBox{border:1px solid #ccc;padding:.5em 1em;margin-right:1em;text-align:center}\
.counter,.percent{font-size:1.6em;font-weight:bold}\
.failures,.failed{color:#b60808}.success,.passed{color:#008000}.skipped,.ignored{color:#c90}\
ul.linkList{list-style:none;padding-left:0}\
table{border-collapse:collapse}td,th{padding:.2em .8em;text-align:left}\
pre{background:#f7f7f7;padding:.5em;overflow:auto}";

/// Write `index.html` and the per-class pages for `results` into `out_dir`.
///
/// The directory is created if needed; existing pages are overwritten.
///
/// # Errors
/// Returns an error if a page cannot be written.
pub fn write_report(results: &TestResults, out_dir: &Path, title: &str) -> Result<(), ReportError> {
    let classes_dir = out_dir.join("classes");
    testhaul_util::fs::ensure_dir(&classes_dir)?;

    write_page(&out_dir.join("index.html"), &render_index(results, title))?;
    for (class_name, cases) in results.by_class() {
        let page = classes_dir.join(format!("{}.html", class_file_stem(class_name)));
        write_page(&page, &render_class(class_name, &cases))?;
    }

    log::debug!(
        "rendered report for {} tests into {}",
        results.total(),
        out_dir.display()
    );
    Ok(())
}

fn write_page(path: &Path, html: &str) -> Result<(), ReportError> {
    std::fs::write(path, html).map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Render the summary page.
pub fn render_index(results: &TestResults, title: &str) -> String {
    let total = results.total();
    let failed = results.with_outcome(Outcome::Failed);
    let ignored = results.with_outcome(Outcome::Skipped);

    let mut html = page_head(&format!("Test results - {title}"));
    let _ = writeln!(html, "<h1>{}</h1>", escape(title));
    html.push_str("<div id=\"summary\">\n<table>\n<tr>\n<td>\n<div class=\"summaryGroup\">\n<table>\n<tr>\n");
    info_box(&mut html, "tests", &total.to_string(), "tests");
    info_box(&mut html, "failures", &failed.len().to_string(), "failures");
    info_box(&mut html, "ignored", &ignored.len().to_string(), "ignored");
    info_box(&mut html, "duration", &format_duration(results.duration()), "duration");
    html.push_str("</tr>\n</table>\n</div>\n</td>\n<td>\n");
    let status = if failed.is_empty() { "success" } else { "failures" };
    let _ = write!(
        html,
        "<div class=\"infoBox {status}\" id=\"successRate\">\n<div class=\"percent\">{}</div>\n<p>successful</p>\n</div>\n",
        success_rate(total, failed.len(), ignored.len())
    );
    html.push_str("</td>\n</tr>\n</table>\n</div>\n");

    let mut tabs: Vec<(&str, String)> = Vec::new();
    if !failed.is_empty() {
        tabs.push(("Failed tests", link_list(&failed)));
    }
    if !ignored.is_empty() {
        tabs.push(("Ignored tests", link_list(&ignored)));
    }
    tabs.push(("Classes", class_table(results)));

    html.push_str("<div id=\"tabs\">\n<ul class=\"tabLinks\">\n");
    for (index, (label, _)) in tabs.iter().enumerate() {
        let _ = writeln!(html, "<li><a href=\"#tab{index}\">{label}</a></li>");
    }
    html.push_str("</ul>\n");
    for (index, (label, body)) in tabs.iter().enumerate() {
        let _ = write!(
            html,
            "<div id=\"tab{index}\" class=\"tab\">\n<h2>{label}</h2>\n{body}</div>\n"
        );
    }
    html.push_str("</div>\n");

    page_foot(&mut html);
    html
}

fn info_box(html: &mut String, id: &str, value: &str, caption: &str) {
    let _ = write!(
        html,
        "<td>\n<div class=\"infoBox\" id=\"{id}\">\n<div class=\"counter\">{}</div>\n<p>{caption}</p>\n</div>\n</td>\n",
        escape(value)
    );
}

fn link_list(cases: &[&TestCase]) -> String {
    let mut html = String::from("<ul class=\"linkList\">\n");
    for case in cases {
        let page = format!("classes/{}.html", class_file_stem(&case.class_name));
        let _ = writeln!(
            html,
            "<li>\n<a href=\"{page}\">{class}</a>.\n<a href=\"{page}#{anchor}\">{name}</a>\n</li>",
            page = escape(&page),
            class = escape(&case.class_name),
            anchor = escape(&case.name),
            name = escape(&case.name),
        );
    }
    html.push_str("</ul>\n");
    html
}

fn class_table(results: &TestResults) -> String {
    let mut html = String::from(
        "<table>\n<thead>\n<tr><th>Class</th><th>Tests</th><th>Failures</th><th>Ignored</th><th>Duration</th></tr>\n</thead>\n<tbody>\n",
    );
    for (class_name, cases) in results.by_class() {
        let failures = cases.iter().filter(|c| c.outcome == Outcome::Failed).count();
        let ignored = cases.iter().filter(|c| c.outcome == Outcome::Skipped).count();
        let duration: Duration = cases.iter().map(|c| c.duration).sum();
        let status = if failures > 0 { "failures" } else { "success" };
        let _ = writeln!(
            html,
            "<tr><td class=\"{status}\"><a href=\"classes/{}.html\">{}</a></td><td>{}</td><td>{failures}</td><td>{ignored}</td><td>{}</td></tr>",
            escape(&class_file_stem(class_name)),
            escape(class_name),
            cases.len(),
            format_duration(duration),
        );
    }
    html.push_str("</tbody>\n</table>\n");
    html
}

/// Render the page of one test class.
pub fn render_class(class_name: &str, cases: &[&TestCase]) -> String {
    let mut html = page_head(&format!("Test results - Class {class_name}"));
    let _ = writeln!(html, "<h1>Class {}</h1>", escape(class_name));
    html.push_str(
        "<table>\n<thead>\n<tr><th>Test</th><th>Duration</th><th>Result</th></tr>\n</thead>\n<tbody>\n",
    );
    for case in cases {
        let _ = writeln!(
            html,
            "<tr><td class=\"{outcome}\"><a id=\"{anchor}\"></a>{name}</td><td>{duration}</td><td class=\"{outcome}\">{outcome}</td></tr>",
            outcome = case.outcome.label(),
            anchor = escape(&case.name),
            name = escape(&case.name),
            duration = format_duration(case.duration),
        );
    }
    html.push_str("</tbody>\n</table>\n");

    let failed: Vec<&&TestCase> = cases
        .iter()
        .filter(|c| c.outcome == Outcome::Failed)
        .collect();
    if !failed.is_empty() {
        html.push_str("<h2>Failures</h2>\n");
        for case in failed {
            let _ = write!(
                html,
                "<div class=\"test\">\n<h3 class=\"failures\">{}</h3>\n<pre>{}</pre>\n</div>\n",
                escape(&case.name),
                escape(case.details.as_deref().unwrap_or_default())
            );
        }
    }

    page_foot(&mut html);
    html
}

fn page_head(title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\"/>\n<title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n<div id=\"content\">\n",
        escape(title)
    )
}

fn page_foot(html: &mut String) {
    html.push_str("<div id=\"footer\">\n<p>Generated by testhaul</p>\n</div>\n</div>\n</body>\n</html>\n");
}

/// Percentage of non-ignored tests that passed, rounded down.
fn success_rate(total: usize, failed: usize, ignored: usize) -> String {
    let executed = total.saturating_sub(ignored);
    if executed == 0 {
        return "-".to_owned();
    }
    let passed = executed.saturating_sub(failed);
    format!("{}%", passed.saturating_mul(100) / executed)
}

fn format_duration(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

/// File stem used for a class page. Path separators cannot appear in it.
pub fn class_file_stem(class_name: &str) -> String {
    class_name.replace(['/', '\\'], "_")
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
