//! Image processing pipeline module
//!
//! This module provides a structured approach to HEIC/HEIF conversion, with
//! separate modules for source decoding, metadata handling, target encoding,
//! and conversion orchestration.

pub mod common;
pub mod conversions;
pub mod encode;
pub mod metadata;
pub mod source;

pub use common::{ConversionError, ExitCode, PipelineTimings, Result};

pub use source::{DecodedImage, HeifDecoder, RawImageBuffer, SourceDecoder};
#[cfg(any(test, feature = "synthetic"))]
pub use source::{FallbackDecoder, SyntheticDecoder};

pub use metadata::{EmbedReport, MetadataBundle, MetadataKind, MetadataPolicy};

pub use encode::{
    EncodeOptions,
    EncodeOptionsBuilder,
    FormatCapabilities,
    ImageWriter,
    OutputFormat,
    StandardImageWriter,
};

pub use conversions::{
    BatchReport,
    ConversionConfig,
    ConversionConfigBuilder,
    ConversionReport,
    HeicConversionPipeline,
    TimestampTriple,
};
