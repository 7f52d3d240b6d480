//! Pipeline conversions module
//!
//! Orchestration of HEIC/HEIF sources into raster destinations: one file at
//! a time, or sequentially over a directory.

mod heic_to_raster;
#[cfg(test)]
mod tests;
pub mod timestamps;
pub mod types;

pub use heic_to_raster::HeicConversionPipeline;
pub use timestamps::TimestampTriple;
pub use types::{BatchReport, ConversionConfig, ConversionConfigBuilder, ConversionReport};
