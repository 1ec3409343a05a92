//! Shared types for the shprobe harness crates.
//!
//! - [`HarnessError`]: the error taxonomy every crate reports through
//! - [`HarnessConfig`]: configuration for the shell under test

pub mod config;
pub mod error;

pub use config::{ExpectedMessages, HarnessConfig};
pub use error::HarnessError;
