//! Target encoding module
//!
//! One serializer per output format behind the [`ImageWriter`] trait, with
//! availability decided once per build by [`FormatCapabilities`].

pub mod bmp_writer;
#[cfg(feature = "jpeg")]
pub mod jpeg_writer;
#[cfg(feature = "png")]
pub mod png_writer;
mod standard_writer;
#[cfg(feature = "tiff")]
pub mod tiff_writer;
pub mod types;
#[cfg(feature = "webp")]
pub mod webp_writer;
mod writer;

pub use standard_writer::StandardImageWriter;
pub use types::{EncodeOptions, EncodeOptionsBuilder, FormatCapabilities, OutputFormat};
pub use writer::ImageWriter;
