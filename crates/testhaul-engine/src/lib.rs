//! Pipeline execution, metadata, publishing and project selection for testhaul.

pub mod error;
pub mod filter;
pub mod graph;
pub mod listing;
pub mod metadata;
pub mod publish;
pub mod stages;
pub mod workspace;

pub use error::{EngineError, PublishErrorKind};
pub use graph::{Pipeline, RunReport, Stage, StageOutcome};
pub use metadata::BuildMetadata;
pub use stages::{assemble_pipeline, default_target};
