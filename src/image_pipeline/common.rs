//! Common utilities module
//!
//! This module contains the error taxonomy, exit codes and step timing shared
//! across the image pipeline.

pub mod error;
pub mod timing;

pub use error::{ConversionError, ExitCode, Result};
pub use timing::{PipelineTimings, StepTiming, Timer};
