//! Build facts provided by the CI environment.
//!
//! The environment is read exactly once, when the pipeline is assembled, and
//! the resulting [`BuildContext`] is handed to every stage that needs it.

use crate::settings::Profile;

pub const BUILD_NUMBER: &str = "BUILD_NUMBER";
pub const BRANCH_NAME: &str = "BRANCH_NAME";
pub const COMMIT_HASH: &str = "COMMIT_HASH";
/// Its presence marks a build-server run; its value becomes the build type.
pub const BUILDSERVER: &str = "BUILDSERVER";

/// Immutable snapshot of the environment-derived build facts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildContext {
    pub build_id: Option<u64>,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub build_server: Option<String>,
    pub profile_flag: Option<String>,
}

/// The values a build-server run cannot do without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub build_id: u64,
    pub branch: String,
    pub commit: String,
}

impl BuildContext {
    /// Read the build context from the process environment.
    ///
    /// # Errors
    /// Returns an error if `BUILD_NUMBER` is set but is not a non-negative integer.
    pub fn from_env() -> Result<Self, ContextError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the context from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error if `BUILD_NUMBER` is set but is not a non-negative integer.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ContextError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let build_id = match lookup(BUILD_NUMBER) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| ContextError::Invalid {
                name: BUILD_NUMBER.to_owned(),
                value: raw.clone(),
                message: e.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            build_id,
            branch: lookup(BRANCH_NAME),
            commit: lookup(COMMIT_HASH),
            build_server: lookup(BUILDSERVER),
            profile_flag: lookup(Profile::ENV_VAR),
        })
    }

    /// Whether this run happens on a build server.
    pub fn on_build_server(&self) -> bool {
        self.build_server.is_some()
    }

    pub fn profile(&self) -> Profile {
        Profile::from_flag(self.profile_flag.as_deref())
    }

    /// Return the build id, branch and commit, all of which must be present.
    ///
    /// # Errors
    /// Returns an error naming the first missing variable.
    pub fn require_build_info(&self) -> Result<BuildInfo, ContextError> {
        let build_id = self.build_id.ok_or_else(|| missing(BUILD_NUMBER))?;
        let branch = self.branch.clone().ok_or_else(|| missing(BRANCH_NAME))?;
        let commit = self.commit.clone().ok_or_else(|| missing(COMMIT_HASH))?;
        Ok(BuildInfo {
            build_id,
            branch,
            commit,
        })
    }
}

fn missing(name: &str) -> ContextError {
    ContextError::Missing {
        name: name.to_owned(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("environment variable {name} is required on the build server but is not set")]
    Missing { name: String },
    #[error("environment variable {name} has invalid value \"{value}\": {message}")]
    Invalid {
        name: String,
        value: String,
        message: String,
    },
}
