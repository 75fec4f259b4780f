//! JUnit XML result files, as written by every JVM test runner.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::ReportError;

/// Final state of a single test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Outcome {
    Passed,
    Failed,
    Skipped,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "ignored",
        }
    }
}

/// One `<testcase>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub class_name: String,
    pub name: String,
    pub duration: Duration,
    pub outcome: Outcome,
    /// Failure message and stack trace, if the test failed.
    pub details: Option<String>,
}

impl TestCase {
    /// `class.name`, the identifier used throughout the rendered report.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.class_name, self.name)
    }
}

/// All test cases of one or more result files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestResults {
    pub cases: Vec<TestCase>,
}

impl TestResults {
    /// Read every `*.xml` file under `dir`, recursively.
    ///
    /// A missing directory yields empty results. Files whose root element is
    /// neither `<testsuite>` nor `<testsuites>` are ignored.
    ///
    /// # Errors
    /// Returns an error if a file cannot be read or is not well-formed XML.
    pub fn load_dir(dir: &Path) -> Result<Self, ReportError> {
        let mut results = Self::default();
        if !dir.is_dir() {
            log::debug!("no results directory at {}", dir.display());
            return Ok(results);
        }
        for file in testhaul_util::fs::collect_files(dir, "xml")? {
            let cases = parse_file(&file)?;
            log::debug!("read {} test cases from {}", cases.len(), file.display());
            results.cases.extend(cases);
        }
        Ok(results)
    }

    pub fn merge(&mut self, other: Self) {
        self.cases.extend(other.cases);
    }

    pub fn total(&self) -> usize {
        self.cases.len()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.cases.iter().filter(|c| c.outcome == outcome).count()
    }

    pub fn duration(&self) -> Duration {
        self.cases.iter().map(|c| c.duration).sum()
    }

    /// Test cases grouped by class, classes and tests in name order.
    pub fn by_class(&self) -> BTreeMap<&str, Vec<&TestCase>> {
        let mut classes: BTreeMap<&str, Vec<&TestCase>> = BTreeMap::new();
        for case in &self.cases {
            classes.entry(case.class_name.as_str()).or_default().push(case);
        }
        for cases in classes.values_mut() {
            cases.sort_by(|a, b| a.name.cmp(&b.name));
        }
        classes
    }

    /// Test cases with the given outcome, sorted by qualified name.
    pub fn with_outcome(&self, outcome: Outcome) -> Vec<&TestCase> {
        let mut cases: Vec<&TestCase> =
            self.cases.iter().filter(|c| c.outcome == outcome).collect();
        cases.sort_by(|a, b| (&a.class_name, &a.name).cmp(&(&b.class_name, &b.name)));
        cases
    }
}

/// Parse a single JUnit XML file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not well-formed XML.
pub fn parse_file(path: &Path) -> Result<Vec<TestCase>, ReportError> {
    let content = std::fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_str(&content, path)
}

fn parse_str(content: &str, path: &Path) -> Result<Vec<TestCase>, ReportError> {
    let doc = roxmltree::Document::parse(content).map_err(|e| ReportError::Results {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let root = doc.root_element();
    if !root.has_tag_name("testsuite") && !root.has_tag_name("testsuites") {
        log::debug!(
            "skipping {}: root element <{}> is not a test suite",
            path.display(),
            root.tag_name().name()
        );
        return Ok(Vec::new());
    }

    let mut cases = Vec::new();
    for node in root.descendants().filter(|n| n.has_tag_name("testcase")) {
        let Some(name) = node.attribute("name") else {
            return Err(ReportError::Results {
                path: path.display().to_string(),
                message: "<testcase> without a name attribute".to_owned(),
            });
        };

        let class_name = node
            .attribute("classname")
            .or_else(|| {
                node.ancestors()
                    .find(|a| a.has_tag_name("testsuite"))
                    .and_then(|suite| suite.attribute("name"))
            })
            .unwrap_or("default")
            .to_owned();

        let duration = node
            .attribute("time")
            .and_then(|t| t.trim().parse::<f64>().ok())
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or_default();

        let mut outcome = Outcome::Passed;
        let mut details = None;
        for child in node.children().filter(roxmltree::Node::is_element) {
            match child.tag_name().name() {
                "failure" | "error" => {
                    outcome = Outcome::Failed;
                    let message = child.attribute("message").unwrap_or_default();
                    let body = child.text().unwrap_or_default().trim();
                    details = Some(if body.is_empty() {
                        message.to_owned()
                    } else {
                        body.to_owned()
                    });
                }
                "skipped" if outcome != Outcome::Failed => outcome = Outcome::Skipped,
                _ => {}
            }
        }

        cases.push(TestCase {
            class_name,
            name: name.to_owned(),
            duration,
            outcome,
            details,
        });
    }
    Ok(cases)
}
