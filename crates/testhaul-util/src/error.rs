//! Error types for testhaul-util.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// An I/O operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A file that must be copied or archived does not exist.
    #[error("missing file {path}")]
    MissingFile { path: String },

    /// Writing a zip archive failed.
    #[error("cannot write archive {path}: {message}")]
    Archive { path: String, message: String },

    /// An HTTP request failed or returned a non-success status.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// A version string contains unsafe characters.
    #[error("invalid version \"{version}\": only alphanumeric characters, dots, hyphens, and underscores are allowed")]
    InvalidVersion { version: String },
}
