//! Error types for testhaul-report.

use std::fmt;

/// Which metric of a report could not be extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    FailureCount,
    IgnoredCount,
    FailedList,
    IgnoredList,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::FailureCount => "failure count",
            Self::IgnoredCount => "ignored count",
            Self::FailedList => "failed test list",
            Self::IgnoredList => "ignored test list",
        };
        f.write_str(label)
    }
}

/// Errors produced while reading results or scraping a rendered report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// A structural element is absent or holds unusable content.
    #[error("cannot parse {kind} from {path}: {message}")]
    Parse {
        kind: ParseErrorKind,
        path: String,
        message: String,
    },

    /// The report contradicts itself, e.g. a positive count with an empty list.
    #[error("inconsistent report {path}: {message}")]
    Inconsistent { path: String, message: String },

    /// A list was requested although its count is zero.
    #[error("cannot extract the {kind} from {path}: the report lists no such tests")]
    Precondition { kind: ParseErrorKind, path: String },

    /// A JUnit XML result file is malformed.
    #[error("invalid JUnit XML in {path}: {message}")]
    Results { path: String, message: String },

    /// A filesystem operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A utility operation failed.
    #[error("{0}")]
    Util(#[from] testhaul_util::error::UtilError),
}

impl ReportError {
    /// Whether the error concerns the content of a rendered report rather
    /// than the filesystem, so a caller may substitute a placeholder.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Inconsistent { .. } | Self::Precondition { .. }
        )
    }
}
