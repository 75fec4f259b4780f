//! Parse and validate `testhaul.toml` and the build environment.

pub mod context;
pub mod settings;

pub use context::BuildContext;
pub use settings::{Profile, Settings};
