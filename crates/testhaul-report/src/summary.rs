//! Extract failure data from a rendered HTML test report.
//!
//! The four extractions are independent and fail narrowly, so a caller can
//! keep the counts when the test names are unreadable, or fall back to a
//! placeholder when nothing can be read at all.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use scraper::{ElementRef, Html, Selector};

use crate::error::{ParseErrorKind, ReportError};

/// Heading and fallback tab id of a test listing section.
struct Listing {
    kind: ParseErrorKind,
    heading: &'static str,
    fallback_id: &'static str,
}

const FAILED: Listing = Listing {
    kind: ParseErrorKind::FailedList,
    heading: "Failed tests",
    fallback_id: "tab0",
};

const IGNORED: Listing = Listing {
    kind: ParseErrorKind::IgnoredList,
    heading: "Ignored tests",
    fallback_id: "tab1",
};

/// A parsed HTML report, typically `build/jUnit/index.html`.
pub struct ReportDocument {
    path: PathBuf,
    html: Html,
}

impl std::fmt::Debug for ReportDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportDocument")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl ReportDocument {
    /// Read and parse the report at `path`. HTML parsing itself is lenient;
    /// structural problems surface from the individual extractions.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read.
    pub fn open(path: &Path) -> Result<Self, ReportError> {
        let content = std::fs::read_to_string(path).map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::parse(&content, path))
    }

    /// Parse `content`, attributing errors to `path`.
    pub fn parse(content: &str, path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            html: Html::parse_document(content),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The own text of the first `#failures div`, as an integer.
    ///
    /// # Errors
    /// Returns [`ReportError::Parse`] with [`ParseErrorKind::FailureCount`] if
    /// the element is absent or its text is not a non-negative integer.
    pub fn failure_count(&self) -> Result<u64, ReportError> {
        self.counter("failures", ParseErrorKind::FailureCount)
    }

    /// The own text of the first `#ignored div`, as an integer.
    ///
    /// # Errors
    /// Returns [`ReportError::Parse`] with [`ParseErrorKind::IgnoredCount`] if
    /// the element is absent or its text is not a non-negative integer.
    pub fn ignored_count(&self) -> Result<u64, ReportError> {
        self.counter("ignored", ParseErrorKind::IgnoredCount)
    }

    /// Fully qualified names of the failed tests.
    ///
    /// Only meaningful when [`ReportDocument::failure_count`] is positive.
    ///
    /// # Errors
    /// - [`ReportError::Precondition`] if the failure count is zero.
    /// - [`ReportError::Parse`] with [`ParseErrorKind::FailedList`] if the
    ///   count or the listing section cannot be read.
    /// - [`ReportError::Inconsistent`] if the listing is empty although the
    ///   count is positive.
    pub fn failed_test_names(&self) -> Result<BTreeSet<String>, ReportError> {
        let count = self.failure_count();
        self.test_names(&FAILED, count)
    }

    /// Fully qualified names of the ignored tests.
    ///
    /// # Errors
    /// As [`ReportDocument::failed_test_names`], with
    /// [`ParseErrorKind::IgnoredList`].
    pub fn ignored_test_names(&self) -> Result<BTreeSet<String>, ReportError> {
        let count = self.ignored_count();
        self.test_names(&IGNORED, count)
    }

    fn counter(&self, box_id: &str, kind: ParseErrorKind) -> Result<u64, ReportError> {
        let css = format!("#{box_id} div");
        let selector = self.selector(&css, kind)?;
        let element = self
            .html
            .select(&selector)
            .next()
            .ok_or_else(|| self.parse_error(kind, format!("no element matches `{css}`")))?;

        let own_text: String = element
            .children()
            .filter_map(|node| node.value().as_text())
            .map(|text| &**text)
            .collect();
        let value = own_text.trim();
        value.parse::<u64>().map_err(|e| {
            self.parse_error(
                kind,
                format!("`{css}` holds \"{value}\", which is not a count: {e}"),
            )
        })
    }

    fn test_names(
        &self,
        listing: &Listing,
        count: Result<u64, ReportError>,
    ) -> Result<BTreeSet<String>, ReportError> {
        let count = count.map_err(|e| match e {
            ReportError::Parse { message, .. } => self.parse_error(
                listing.kind,
                format!("the matching count is unreadable: {message}"),
            ),
            other => other,
        })?;
        if count == 0 {
            return Err(ReportError::Precondition {
                kind: listing.kind,
                path: self.path.display().to_string(),
            });
        }

        let section = self.listing_section(listing)?.ok_or_else(|| {
            self.parse_error(
                listing.kind,
                format!("no \"{}\" section found", listing.heading),
            )
        })?;

        let item_selector = self.selector("ul li", listing.kind)?;
        let link_selector = self.selector("a", listing.kind)?;

        let mut names = BTreeSet::new();
        for item in section.select(&item_selector) {
            let href = item
                .select(&link_selector)
                .nth(1)
                .and_then(|link| link.value().attr("href"))
                .ok_or_else(|| {
                    self.parse_error(
                        listing.kind,
                        format!(
                            "entry \"{}\" has no test link",
                            item.text().collect::<String>().trim()
                        ),
                    )
                })?;
            let name = test_name_from_href(href);
            if name.is_empty() {
                return Err(self.parse_error(listing.kind, format!("empty test link \"{href}\"")));
            }
            names.insert(name);
        }

        if names.is_empty() {
            return Err(ReportError::Inconsistent {
                path: self.path.display().to_string(),
                message: format!(
                    "the report counts {count} tests but its \"{}\" listing is empty",
                    listing.heading
                ),
            });
        }
        if u64::try_from(names.len()).ok() != Some(count) {
            log::warn!(
                "{}: the report counts {count} tests but lists {} under \"{}\"",
                self.path.display(),
                names.len(),
                listing.heading
            );
        }
        Ok(names)
    }

    /// Locate a listing tab by its heading. Reports without any headed tab
    /// are searched by the tab's fixed id instead.
    fn listing_section(&self, listing: &Listing) -> Result<Option<ElementRef<'_>>, ReportError> {
        let tab_selector = self.selector("div.tab", listing.kind)?;
        let heading_selector = self.selector("h2", listing.kind)?;

        let mut headed = false;
        for tab in self.html.select(&tab_selector) {
            if let Some(heading) = tab.select(&heading_selector).next() {
                headed = true;
                if heading.text().collect::<String>().trim() == listing.heading {
                    return Ok(Some(tab));
                }
            }
        }
        if headed {
            return Ok(None);
        }

        let id_selector = self.selector(&format!("#{}", listing.fallback_id), listing.kind)?;
        Ok(self.html.select(&id_selector).next())
    }

    fn selector(&self, css: &str, kind: ParseErrorKind) -> Result<Selector, ReportError> {
        Selector::parse(css)
            .map_err(|e| self.parse_error(kind, format!("invalid selector `{css}`: {e}")))
    }

    fn parse_error(&self, kind: ParseErrorKind, message: String) -> ReportError {
        ReportError::Parse {
            kind,
            path: self.path.display().to_string(),
            message,
        }
    }
}

/// `classes/a.b.CTest.html#testX` becomes `a.b.CTest.testX`.
pub fn test_name_from_href(href: &str) -> String {
    href.replace("classes/", "").replace("html#", "")
}

/// Counts and test names of one report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    failures: u64,
    ignored: u64,
    failed_tests: BTreeSet<String>,
    ignored_tests: BTreeSet<String>,
}

impl ReportSummary {
    /// Extract every metric from `doc`. Name lists are only read when the
    /// matching count is positive.
    ///
    /// # Errors
    /// Returns the first extraction error.
    pub fn from_document(doc: &ReportDocument) -> Result<Self, ReportError> {
        let failures = doc.failure_count()?;
        let ignored = doc.ignored_count()?;
        let failed_tests = if failures > 0 {
            doc.failed_test_names()?
        } else {
            BTreeSet::new()
        };
        let ignored_tests = if ignored > 0 {
            doc.ignored_test_names()?
        } else {
            BTreeSet::new()
        };
        Ok(Self {
            failures,
            ignored,
            failed_tests,
            ignored_tests,
        })
    }

    /// Open the report at `path` and summarize it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or any extraction fails.
    pub fn from_path(path: &Path) -> Result<Self, ReportError> {
        Self::from_document(&ReportDocument::open(path)?)
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    pub fn failed_tests(&self) -> &BTreeSet<String> {
        &self.failed_tests
    }

    pub fn ignored_tests(&self) -> &BTreeSet<String> {
        &self.ignored_tests
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::render::render_index;
    use crate::results::{Outcome, TestCase, TestResults};

    const GRADLE_INDEX: &str = include_str!("../testdata/gradle_index.html");
    const PLUGIN_TEST: &str = "com.visus.infrastructure.jUnitReportsPluginTest";

    const FAILED_23: [&str; 23] = [
        "testApplyPluginExtraPropertiesSet",
        "testApplyPluginExtraWithProductionSystemPropertiesSet",
        "testApplyPluginExtraWithTestingSystemPropertiesSet",
        "testApplyPluginFilteringFunctionNotFound",
        "testApplyPluginMissingDefaultEndpointTemplate",
        "testApplyPluginMissingFilteringFunctionName",
        "testApplyPluginMissingPatchEndpointTemplate",
        "testApplyPluginMissingProductPatchInfo",
        "testApplyPluginMissingProductRC",
        "testApplyPluginMissingProductVersion",
        "testApplyPluginMissingRESTEndpoint",
        "testApplyPluginMissingVersionEndpointTemplate",
        "testApplyPluginProductRCNotFound",
        "testApplyPluginProductVersionNotFound",
        "testApplyPluginToNonRootProject",
        "testApplyPluginWithAllEnvironmentVariablesToProject",
        "testApplyPluginWithEnvironmentVariablesToProject",
        "testApplyPluginWithoutJavaPlugin",
        "testApplyPluginWithoutPropertiesToProject",
        "testApplyPluginWrongFilteringFunctionName",
        "testEvaluateRootProjectTasksBuildServer",
        "testEvaluateRootProjectTasksNoBuildServer",
        "testEvaluateSubProjectTasks",
    ];

    fn doc(html: &str) -> ReportDocument {
        ReportDocument::parse(html, Path::new("build/jUnit/index.html"))
    }

    fn expected_failed() -> BTreeSet<String> {
        FAILED_23
            .iter()
            .map(|name| format!("{PLUGIN_TEST}.{name}"))
            .collect()
    }

    #[test]
    fn gradle_report_counts() {
        let report = doc(GRADLE_INDEX);
        assert_eq!(report.failure_count().unwrap(), 23);
        assert_eq!(report.ignored_count().unwrap(), 1);
    }

    #[test]
    fn gradle_report_failed_names() {
        let names = doc(GRADLE_INDEX).failed_test_names().unwrap();
        assert_eq!(names.len(), 23);
        assert!(names.contains(
            "com.visus.infrastructure.jUnitReportsPluginTest.testApplyPluginToNonRootProject"
        ));
        assert_eq!(names, expected_failed());
    }

    #[test]
    fn gradle_report_ignored_names() {
        let names = doc(GRADLE_INDEX).ignored_test_names().unwrap();
        let expected: BTreeSet<String> =
            ["com.visus.infrastructure.extension.FileExtensionTest.testDeleteReadOnlyFile".to_owned()]
                .into_iter()
                .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn summary_from_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.html");
        std::fs::write(&path, GRADLE_INDEX).unwrap();

        let summary = ReportSummary::from_path(&path).unwrap();
        assert_eq!(summary.failures(), 23);
        assert_eq!(summary.ignored(), 1);
        assert_eq!(summary.failed_tests(), &expected_failed());
        assert_eq!(summary.ignored_tests().len(), 1);
    }

    #[test]
    fn missing_failure_counter_is_parse_error_not_zero() {
        let report = doc("<html><body><div id=\"tests\"><div>4</div></div></body></html>");
        let err = report.failure_count().unwrap_err();
        assert!(
            matches!(err, ReportError::Parse { kind: ParseErrorKind::FailureCount, .. }),
            "error was: {err}"
        );
    }

    #[test]
    fn non_numeric_counter_is_parse_error() {
        let report = doc(
            "<div id=\"failures\"><div class=\"counter\">many</div></div>\
             <div id=\"ignored\"><div class=\"counter\">-1</div></div>",
        );
        let err = report.failure_count().unwrap_err();
        assert!(
            matches!(err, ReportError::Parse { kind: ParseErrorKind::FailureCount, .. }),
            "error was: {err}"
        );
        let err = report.ignored_count().unwrap_err();
        assert!(
            matches!(err, ReportError::Parse { kind: ParseErrorKind::IgnoredCount, .. }),
            "error was: {err}"
        );
    }

    #[test]
    fn counter_uses_own_text_only() {
        let report = doc("<div id=\"failures\"><div> 2 <span>9</span></div></div>");
        assert_eq!(report.failure_count().unwrap(), 2);
    }

    #[test]
    fn zero_failures_violates_precondition() {
        let report = doc("<div id=\"failures\"><div>0</div></div>");
        let err = report.failed_test_names().unwrap_err();
        assert!(
            matches!(err, ReportError::Precondition { kind: ParseErrorKind::FailedList, .. }),
            "error was: {err}"
        );
        assert!(err.is_parse_error());
    }

    #[test]
    fn missing_listing_is_failed_list_error() {
        let report = doc(
            "<div id=\"failures\"><div>3</div></div>\
             <div id=\"tab0\" class=\"tab\"><h2>Classes</h2><table></table></div>",
        );
        let err = report.failed_test_names().unwrap_err();
        assert!(
            matches!(err, ReportError::Parse { kind: ParseErrorKind::FailedList, .. }),
            "error was: {err}"
        );
    }

    #[test]
    fn unreadable_count_fails_the_list() {
        let report = doc("<div id=\"ignored\"><div>x</div></div>");
        let err = report.ignored_test_names().unwrap_err();
        assert!(
            matches!(err, ReportError::Parse { kind: ParseErrorKind::IgnoredList, .. }),
            "error was: {err}"
        );
    }

    #[test]
    fn empty_listing_with_positive_count_is_inconsistent() {
        let report = doc(
            "<div id=\"failures\"><div>2</div></div>\
             <div id=\"tab0\" class=\"tab\"><h2>Failed tests</h2><ul class=\"linkList\"></ul></div>",
        );
        let err = report.failed_test_names().unwrap_err();
        assert!(matches!(err, ReportError::Inconsistent { .. }), "error was: {err}");
    }

    #[test]
    fn entry_without_test_link_is_parse_error() {
        let report = doc(
            "<div id=\"failures\"><div>1</div></div>\
             <div id=\"tab0\" class=\"tab\"><h2>Failed tests</h2><ul><li><a href=\"classes/A.html\">A</a></li></ul></div>",
        );
        let err = report.failed_test_names().unwrap_err().to_string();
        assert!(err.contains("no test link"), "error was: {err}");
    }

    #[test]
    fn unheaded_report_falls_back_to_tab_ids() {
        let report = doc(
            "<div id=\"ignored\"><div>1</div></div>\
             <div id=\"tab1\"><ul><li><a href=\"classes/a.B.html\">B</a>.<a href=\"classes/a.B.html#skipMe\">skipMe</a></li></ul></div>",
        );
        let names = report.ignored_test_names().unwrap();
        assert!(names.contains("a.B.skipMe"));
    }

    #[test]
    fn href_stripping() {
        assert_eq!(
            test_name_from_href("classes/com.x.FooTest.html#testA"),
            "com.x.FooTest.testA"
        );
    }

    #[test]
    fn rendered_report_reads_back() {
        let mut cases: Vec<TestCase> = FAILED_23
            .iter()
            .map(|name| TestCase {
                class_name: PLUGIN_TEST.to_owned(),
                name: (*name).to_owned(),
                duration: Duration::from_millis(40),
                outcome: Outcome::Failed,
                details: Some("AssertionError".to_owned()),
            })
            .collect();
        cases.push(TestCase {
            class_name: "a.b.OtherTest".to_owned(),
            name: "passes".to_owned(),
            duration: Duration::ZERO,
            outcome: Outcome::Passed,
            details: None,
        });
        let html = render_index(&TestResults { cases }, "root");

        let summary = ReportSummary::from_document(&doc(&html)).unwrap();
        assert_eq!(summary.failures(), 23);
        assert_eq!(summary.ignored(), 0);
        assert_eq!(summary.failed_tests(), &expected_failed());
        assert!(summary.ignored_tests().is_empty());
    }

    #[test]
    fn open_missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ReportDocument::open(&tmp.path().join("index.html")).unwrap_err();
        assert!(matches!(err, ReportError::Io { .. }), "error was: {err}");
        assert!(!err.is_parse_error());
    }
}

#[cfg(test)]
mod proptests {
    use std::path::Path;

    use super::ReportDocument;

    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    proptest! {
        /// Arbitrary markup must produce a count or an error, never a panic.
        #[test]
        fn arbitrary_markup_never_panics(html in ".*") {
            let doc = ReportDocument::parse(&html, Path::new("index.html"));
            let _ = doc.failure_count();
            let _ = doc.failed_test_names();
        }

        #[test]
        fn counter_round_trips(count in 0u64..100_000) {
            let html = format!("<div id=\"failures\"><div class=\"counter\">{count}</div></div>");
            let doc = ReportDocument::parse(&html, Path::new("index.html"));
            let parsed = doc.failure_count();
            prop_assert!(parsed.is_ok());
            prop_assert_eq!(parsed.unwrap_or_default(), count);
        }
    }
}
