#![forbid(unsafe_code)]
//! Filesystem, archive, HTTP and version helpers shared by the testhaul crates.

pub mod archive;
pub mod error;
pub mod fs;
pub mod http;
pub mod version;
