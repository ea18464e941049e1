//! EFO Pipeline Common Library
//!
//! Shared functionality for the EFO pipeline crates:
//! - Error types
//! - Logging configuration and initialization

pub mod error;
pub mod logging;

pub use error::{PipelineError, Result};
