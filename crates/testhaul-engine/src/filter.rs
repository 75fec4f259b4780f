//! Deciding which subprojects take part in a run.

use std::path::Path;

use glob::Pattern;
use testhaul_config::settings::FilterSettings;

use crate::error::EngineError;

const SOURCE_EXTENSIONS: [&str; 4] = ["java", "kt", "groovy", "scala"];
const TEST_ANNOTATION: &str = "@Test";

/// Keep the candidates accepted by `predicate`, in input order.
///
/// # Errors
/// Returns the first error raised by `predicate`; later candidates are not
/// evaluated.
pub fn select<I, S, P, E>(candidates: I, mut predicate: P) -> Result<Vec<String>, E>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    P: FnMut(&str) -> Result<bool, E>,
{
    let mut selected = Vec::new();
    for candidate in candidates {
        let name = candidate.as_ref();
        if predicate(name)? {
            selected.push(name.to_owned());
        }
    }
    Ok(selected)
}

/// Include/exclude glob patterns over subproject names.
#[derive(Debug, Clone)]
pub struct ProjectFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl ProjectFilter {
    /// Compile the configured patterns.
    ///
    /// # Errors
    /// Returns a configuration error naming the first invalid pattern.
    pub fn from_settings(settings: &FilterSettings) -> Result<Self, EngineError> {
        Ok(Self {
            include: compile(&settings.include, "product.filter.include")?,
            exclude: compile(&settings.exclude, "product.filter.exclude")?,
        })
    }

    /// A name is accepted when it matches some include pattern and no
    /// exclude pattern.
    pub fn accepts(&self, name: &str) -> bool {
        self.include.iter().any(|p| p.matches(name)) && !self.exclude.iter().any(|p| p.matches(name))
    }
}

fn compile(patterns: &[String], key: &str) -> Result<Vec<Pattern>, EngineError> {
    patterns
        .iter()
        .map(|raw| {
            Pattern::new(raw).map_err(|e| EngineError::Config {
                key: key.to_owned(),
                message: format!("invalid pattern \"{raw}\": {e}"),
            })
        })
        .collect()
}

/// Whether `project_dir` looks like it contains JUnit tests.
///
/// Scans `test_sources` (relative to `project_dir`) for JVM source files that
/// are named like a test or carry an `@Test` annotation. Logs a warning naming
/// the project when nothing is found.
pub fn has_likely_test_cases(name: &str, project_dir: &Path, test_sources: &[String]) -> bool {
    let found = test_sources
        .iter()
        .any(|source| contains_test_source(&project_dir.join(source)));
    if !found {
        log::warn!(
            "No test cases were found in project '{name}'! Maybe exclude it with \
             product.filter.exclude or add some actual jUnit tests."
        );
    }
    found
}

fn contains_test_source(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    for extension in SOURCE_EXTENSIONS {
        let files = match testhaul_util::fs::collect_files(dir, extension) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("skipping test sources in {}: {e}", dir.display());
                return false;
            }
        };
        for file in files {
            if is_test_file_name(&file) || has_test_annotation(&file) {
                log::debug!("found test source {}", file.display());
                return true;
            }
        }
    }
    false
}

fn is_test_file_name(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    let test_prefix = stem
        .strip_prefix("Test")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(|c: char| c.is_ascii_uppercase()));
    test_prefix
        || stem.ends_with("Test")
        || stem.ends_with("Tests")
        || stem.ends_with("TestCase")
        || stem.ends_with("IT")
}

fn has_test_annotation(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|content| content.contains(TEST_ANNOTATION))
        .unwrap_or(false)
}
