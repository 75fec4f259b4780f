use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default settings file name, looked up at the workspace root.
pub const SETTINGS_FILE: &str = "testhaul.toml";

/// The `testhaul.toml` settings file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub project: ProjectSettings,
    #[serde(default)]
    pub product: ProductSettings,
    #[serde(default)]
    pub endpoint: EndpointSettings,
    #[serde(default)]
    pub artifacts: ArtifactSettings,
    /// Overrides applied when running against the production system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub productive: Option<ProfileSettings>,
    /// Overrides applied when running against a testing system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testing: Option<ProfileSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Participating subprojects. Discovered from the workspace when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subprojects: Option<Vec<String>>,
    /// Directory, relative to each subproject, holding raw JUnit XML results.
    #[serde(default = "default_results_dir")]
    pub results_dir: String,
    /// Directory, relative to each project, receiving the combined report.
    #[serde(default = "default_report_dir")]
    pub report_dir: String,
    /// Test source roots scanned by the "has test cases" check.
    #[serde(default = "default_test_sources")]
    pub test_sources: Vec<String>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            subprojects: None,
            results_dir: default_results_dir(),
            report_dir: default_report_dir(),
            test_sources: default_test_sources(),
        }
    }
}

fn default_results_dir() -> String {
    "build/test-results".to_owned()
}

fn default_report_dir() -> String {
    "build/jUnit".to_owned()
}

fn default_test_sources() -> Vec<String> {
    vec![
        "src/test/java".to_owned(),
        "src/test/kotlin".to_owned(),
        "src/test/groovy".to_owned(),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Release-candidate label, e.g. `RC01`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rc: Option<String>,
    /// `true` for a patch build, `false` for a version build, absent for neither.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<bool>,
    #[serde(default)]
    pub filter: FilterSettings,
}

/// Glob patterns selecting participating subprojects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSettings {
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: Vec::new(),
        }
    }
}

fn default_include() -> Vec<String> {
    vec!["*".to_owned()]
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// REST endpoint receiving the multipart upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<String>,
    #[serde(default)]
    pub share: ShareSettings,
}

/// File-share destination templates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShareSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSettings {
    #[serde(default = "default_archive")]
    pub archive: String,
    #[serde(default = "default_metadata")]
    pub metadata: String,
    #[serde(default = "default_failed_list")]
    pub failed_list: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            archive: default_archive(),
            metadata: default_metadata(),
            failed_list: default_failed_list(),
        }
    }
}

fn default_archive() -> String {
    "jUnit.zip".to_owned()
}

fn default_metadata() -> String {
    "jUnit.json".to_owned()
}

fn default_failed_list() -> String {
    "failed_junit_tests.txt".to_owned()
}

/// A `[productive]` or `[testing]` section. Each present table replaces the
/// corresponding base table wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointSettings>,
}

/// Which set of product and endpoint settings is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Base,
    Productive,
    Testing,
}

impl Profile {
    /// Environment variable selecting the profile.
    pub const ENV_VAR: &'static str = "TESTHAUL_PRODUCTION_SYSTEM";

    /// Select a profile from the raw value of [`Profile::ENV_VAR`].
    ///
    /// Absent, blank, or an unexpanded reference to the variable name itself
    /// selects [`Profile::Base`]. `true` in any case selects
    /// [`Profile::Productive`]; every other value selects [`Profile::Testing`].
    pub fn from_flag(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim) else {
            return Self::Base;
        };
        if value.is_empty() || value == Self::ENV_VAR {
            Self::Base
        } else if value.eq_ignore_ascii_case("true") {
            Self::Productive
        } else {
            Self::Testing
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Productive => "productive",
            Self::Testing => "testing",
        }
    }
}

impl Settings {
    /// Read and parse a `testhaul.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let settings = Self::from_str_at(&content, path)?;
        Ok(settings)
    }

    /// Like [`Settings::from_path`], but returns the defaults when the file
    /// does not exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn from_path_or_default(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::debug!("{} not found, using default settings", path.display());
            return Ok(Self::default());
        }
        Self::from_path(path)
    }

    fn from_str_at(content: &str, path: &Path) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply the overrides of `profile`, consuming the profile sections.
    #[must_use]
    pub fn resolve(mut self, profile: Profile) -> Self {
        let overrides = match profile {
            Profile::Base => None,
            Profile::Productive => self.productive.take(),
            Profile::Testing => self.testing.take(),
        };
        self.productive = None;
        self.testing = None;

        match overrides {
            Some(overrides) => {
                log::info!("using {} settings profile", profile.label());
                if let Some(product) = overrides.product {
                    self.product = product;
                }
                if let Some(endpoint) = overrides.endpoint {
                    self.endpoint = endpoint;
                }
            }
            None if profile != Profile::Base => {
                log::warn!(
                    "{} selects the {} profile, but no [{}] section is configured",
                    Profile::ENV_VAR,
                    profile.label(),
                    profile.label()
                );
            }
            None => {}
        }
        self
    }

    /// Check values that are syntactically valid TOML but unusable.
    ///
    /// # Errors
    /// Returns an error naming the offending setting.
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (key, value) in [
            ("artifacts.archive", &self.artifacts.archive),
            ("artifacts.metadata", &self.artifacts.metadata),
            ("artifacts.failed_list", &self.artifacts.failed_list),
        ] {
            if value.trim().is_empty() || value.contains('/') || value.contains('\\') {
                return Err(SettingsError::Invalid {
                    key: key.to_owned(),
                    message: format!("\"{value}\" must be a plain file name"),
                });
            }
        }

        for (key, value) in [
            ("project.results_dir", &self.project.results_dir),
            ("project.report_dir", &self.project.report_dir),
        ] {
            if value.trim().is_empty() {
                return Err(SettingsError::Invalid {
                    key: key.to_owned(),
                    message: "must not be empty".to_owned(),
                });
            }
        }

        if let Some(subprojects) = &self.project.subprojects {
            let mut seen = std::collections::BTreeSet::new();
            for name in subprojects {
                if !seen.insert(name.as_str()) {
                    return Err(SettingsError::Invalid {
                        key: "project.subprojects".to_owned(),
                        message: format!("\"{name}\" is listed more than once"),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid testhaul.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("invalid setting `{key}`: {message}")]
    Invalid { key: String, message: String },
}
