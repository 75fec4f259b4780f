//! The human-readable listing of failing tests shipped with each run.
//!
//! The listing is only written when the report shows failures. When the
//! report cannot be scraped, a placeholder asking for a manual check is
//! written instead and the run carries on.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use testhaul_report::{ReportDocument, ReportError};

use crate::error::EngineError;

const PREFIX: &str = "[testhaul]";

/// What [`write_failed_list`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOutcome {
    /// The report shows no failures; nothing was written.
    NoFailures,
    /// A listing with `failures` entries was written.
    Written { failures: u64 },
    /// The failure count could not be read; a placeholder was written.
    Placeholder,
}

/// Listing text for `failures` failing tests.
///
/// `names` is `None` when the names could not be extracted, in which case the
/// reader is sent to the archived report.
pub fn failed_list_text(failures: u64, names: Option<&BTreeSet<String>>, ignored: u64) -> String {
    let mut content = format!("{PREFIX} There were {failures} failing jUnit tests overall:\n\n");
    match names {
        Some(names) => {
            for name in names {
                let _ = write!(content, "- {name}\n  Explanation:\n\n");
            }
        }
        None => content.push_str(
            "This tool could not list them in this file, so you must do it yourself: \
             Open junit-qa/jUnit.zip -> index.html and sort them out!",
        ),
    }
    if ignored > 0 {
        let _ = write!(
            content,
            "\n\nThere were {ignored} ignored jUnit tests as well. You should take a look why \
             they were skipped / ignored (on purpose?) and maybe reactivate them!"
        );
    }
    content
}

/// Text written when the failure count itself is unreadable.
pub fn placeholder_text() -> String {
    format!(
        "{PREFIX} This tool could not parse the jUnit report index.html file and therefore \
         could not determine if there were failing jUnit tests or not. You must check \
         yourself: Open junit-qa/jUnit.zip -> index.html and, if there were failed tests, \
         add them here otherwise delete this file!"
    )
}

/// Scrape `report_index` and write the failure listing to `out_path`.
///
/// Scraping problems never fail the call: an unreadable failure count yields
/// a placeholder, unreadable names or ignored counts degrade the listing, and
/// each is logged as a warning.
///
/// # Errors
/// Returns an error only if `out_path` cannot be written.
pub fn write_failed_list(report_index: &Path, out_path: &Path) -> Result<ListingOutcome, EngineError> {
    let failures = ReportDocument::open(report_index).and_then(|doc| {
        let failures = doc.failure_count()?;
        Ok((doc, failures))
    });

    let (content, outcome) = match failures {
        Ok((_, 0)) => {
            log::info!("no failing tests in {}", report_index.display());
            return Ok(ListingOutcome::NoFailures);
        }
        Ok((doc, failures)) => {
            let names = doc
                .failed_test_names()
                .map_err(|e| degraded("list of failed tests", &e))
                .ok();
            let ignored = doc
                .ignored_count()
                .map_err(|e| degraded("number of ignored tests", &e))
                .unwrap_or(0);
            (
                failed_list_text(failures, names.as_ref(), ignored),
                ListingOutcome::Written { failures },
            )
        }
        Err(e) => {
            degraded("number of failed tests", &e);
            (placeholder_text(), ListingOutcome::Placeholder)
        }
    };

    std::fs::write(out_path, content).map_err(|source| EngineError::Io {
        path: out_path.display().to_string(),
        source,
    })?;
    log::info!("wrote {}", out_path.display());
    Ok(outcome)
}

fn degraded(what: &str, err: &ReportError) {
    log::warn!("parsing the {what} failed: {err}");
    log::warn!("the failure listing is incomplete; check the archived report by hand");
}
