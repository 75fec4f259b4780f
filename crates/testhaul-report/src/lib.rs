#![forbid(unsafe_code)]
//! JUnit result reading, HTML report rendering, and report scraping.

pub mod error;
pub mod render;
pub mod results;
pub mod summary;

pub use error::{ParseErrorKind, ReportError};
pub use results::{Outcome, TestCase, TestResults};
pub use summary::{ReportDocument, ReportSummary};
