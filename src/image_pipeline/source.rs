//! Source decoding module
//!
//! Container recognition, the decoded pixel model, and the decoders that
//! produce it.

pub mod container;
mod heif_reader;
mod reader;
#[cfg(any(test, feature = "synthetic"))]
mod synthetic_reader;
pub mod types;

pub use container::{is_format_supported, supported_formats, SUPPORTED_INPUT_FORMATS};
pub use heif_reader::HeifDecoder;
pub use reader::SourceDecoder;
#[cfg(any(test, feature = "synthetic"))]
pub use synthetic_reader::{FallbackDecoder, SyntheticDecoder};
pub use types::{DecodedImage, RawImageBuffer};
