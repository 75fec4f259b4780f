//! Error types for testhaul-engine.

use std::fmt;

/// Which side of a publish failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishErrorKind {
    /// The REST upload failed or was rejected.
    Transport,
    /// A file could not be placed on the share.
    Filesystem,
}

impl fmt::Display for PublishErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => f.write_str("transport"),
            Self::Filesystem => f.write_str("filesystem"),
        }
    }
}

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] testhaul_util::error::UtilError),

    /// Reading results or scraping a report failed.
    #[error("{0}")]
    Report(#[from] testhaul_report::ReportError),

    /// The settings file is unusable.
    #[error("{0}")]
    Settings(#[from] testhaul_config::settings::SettingsError),

    /// The build environment is incomplete or malformed.
    #[error("{0}")]
    Context(#[from] testhaul_config::context::ContextError),

    /// A required setting is absent or malformed.
    #[error("invalid configuration for `{key}`: {message}")]
    Config { key: String, message: String },

    /// A stage with the same name is already registered.
    #[error("stage `{name}` is already registered")]
    DuplicateStage { name: String },

    /// Stage dependencies form a cycle.
    #[error("stage dependency cycle detected: {cycle}")]
    StageCycle { cycle: String },

    /// A stage or one of its dependencies is not registered.
    #[error("unknown stage `{name}`{}", required_by_suffix(.required_by))]
    UnknownStage {
        name: String,
        required_by: Option<String>,
    },

    /// A stage action failed; the run was halted.
    #[error("stage `{stage}` failed: {source}")]
    StageFailed {
        stage: String,
        source: Box<EngineError>,
    },

    /// Publishing an artifact failed.
    #[error("publish failed ({kind}): {message}")]
    Publish {
        kind: PublishErrorKind,
        message: String,
    },

    /// A share template still contains a `{TOKEN}` after resolution.
    #[error("template \"{template}\" contains unresolved token {token}")]
    UnresolvedToken { template: String, token: String },

    /// A share template uses a token that has no value for this build.
    #[error("template \"{template}\" uses {token}, but {reason}")]
    MissingToken {
        template: String,
        token: String,
        reason: String,
    },

    /// A subproject appears more than once in the metadata.
    #[error("project `{name}` is listed more than once")]
    DuplicateProject { name: String },

    /// Metadata serialization/deserialization failed.
    #[error("cannot process metadata: {message}")]
    Metadata { message: String },
}

fn required_by_suffix(required_by: &Option<String>) -> String {
    required_by
        .as_ref()
        .map(|by| format!(" (required by `{by}`)"))
        .unwrap_or_default()
}

impl EngineError {
    /// The innermost error, looking through [`EngineError::StageFailed`].
    pub fn root_cause(&self) -> &EngineError {
        match self {
            Self::StageFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
