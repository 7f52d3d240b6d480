//! Conversion configuration and result types

use std::path::PathBuf;

use crate::image_pipeline::common::timing::PipelineTimings;
use crate::image_pipeline::encode::types::{EncodeOptions, OutputFormat};
use crate::image_pipeline::metadata::types::{EmbedReport, MetadataBundle, MetadataPolicy};

pub const DEFAULT_MAX_DIMENSION: u32 = 50_000;

/// Configuration for HEIC to raster conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionConfig {
    /// Target format. `None` derives it from the destination extension.
    pub format: Option<OutputFormat>,
    /// Lossy quality, clamped to 1-100 when encoding
    pub quality: i32,
    /// Deflate-style level, clamped to 0-9 when encoding
    pub compression_level: i32,
    pub progressive: bool,
    pub interlace: bool,
    pub lossless: bool,
    pub metadata: MetadataPolicy,
    pub preserve_timestamps: bool,
    /// Replace an existing destination instead of failing with OutputExists
    pub overwrite: bool,
    /// Accepted and range-checked, but not applied to pixels
    pub scale: f32,
    /// Whether to validate image dimensions before encoding
    pub validate_dimensions: bool,
    pub max_dimension: Option<u32>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            format: None,
            quality: 85,
            compression_level: 6,
            progressive: false,
            interlace: false,
            lossless: false,
            metadata: MetadataPolicy::default(),
            preserve_timestamps: true,
            overwrite: false,
            scale: 1.0,
            validate_dimensions: true,
            max_dimension: Some(DEFAULT_MAX_DIMENSION),
        }
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder::default()
    }

    pub fn encode_options(&self, format: OutputFormat, metadata: MetadataBundle) -> EncodeOptions {
        EncodeOptions::builder()
            .format(format)
            .quality(self.quality)
            .compression_level(self.compression_level)
            .progressive(self.progressive)
            .interlace(self.interlace)
            .lossless(self.lossless)
            .metadata(metadata)
            .build()
    }
}

/// Builder for ConversionConfig
#[derive(Default)]
pub struct ConversionConfigBuilder {
    format: Option<OutputFormat>,
    quality: Option<i32>,
    compression_level: Option<i32>,
    progressive: Option<bool>,
    interlace: Option<bool>,
    lossless: Option<bool>,
    keep_metadata: Option<bool>,
    preserve_exif: Option<bool>,
    preserve_xmp: Option<bool>,
    preserve_iptc: Option<bool>,
    preserve_gps: Option<bool>,
    preserve_timestamps: Option<bool>,
    overwrite: Option<bool>,
    scale: Option<f32>,
    validate_dimensions: Option<bool>,
    max_dimension: Option<Option<u32>>,
}

impl ConversionConfigBuilder {
    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn quality(mut self, quality: i32) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    pub fn progressive(mut self, enable: bool) -> Self {
        self.progressive = Some(enable);
        self
    }

    pub fn interlace(mut self, enable: bool) -> Self {
        self.interlace = Some(enable);
        self
    }

    pub fn lossless(mut self, enable: bool) -> Self {
        self.lossless = Some(enable);
        self
    }

    pub fn keep_metadata(mut self, keep: bool) -> Self {
        self.keep_metadata = Some(keep);
        self
    }

    pub fn preserve_exif(mut self, preserve: bool) -> Self {
        self.preserve_exif = Some(preserve);
        self
    }

    pub fn preserve_xmp(mut self, preserve: bool) -> Self {
        self.preserve_xmp = Some(preserve);
        self
    }

    pub fn preserve_iptc(mut self, preserve: bool) -> Self {
        self.preserve_iptc = Some(preserve);
        self
    }

    pub fn preserve_gps(mut self, preserve: bool) -> Self {
        self.preserve_gps = Some(preserve);
        self
    }

    pub fn preserve_timestamps(mut self, preserve: bool) -> Self {
        self.preserve_timestamps = Some(preserve);
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn max_dimension(mut self, max: Option<u32>) -> Self {
        self.max_dimension = Some(max);
        self
    }

    pub fn build(self) -> ConversionConfig {
        let default = ConversionConfig::default();
        let policy = default.metadata;
        ConversionConfig {
            format: self.format.or(default.format),
            quality: self.quality.unwrap_or(default.quality),
            compression_level: self.compression_level.unwrap_or(default.compression_level),
            progressive: self.progressive.unwrap_or(default.progressive),
            interlace: self.interlace.unwrap_or(default.interlace),
            lossless: self.lossless.unwrap_or(default.lossless),
            metadata: MetadataPolicy {
                keep_metadata: self.keep_metadata.unwrap_or(policy.keep_metadata),
                preserve_exif: self.preserve_exif.unwrap_or(policy.preserve_exif),
                preserve_xmp: self.preserve_xmp.unwrap_or(policy.preserve_xmp),
                preserve_iptc: self.preserve_iptc.unwrap_or(policy.preserve_iptc),
                preserve_gps: self.preserve_gps.unwrap_or(policy.preserve_gps),
            },
            preserve_timestamps: self.preserve_timestamps.unwrap_or(default.preserve_timestamps),
            overwrite: self.overwrite.unwrap_or(default.overwrite),
            scale: self.scale.unwrap_or(default.scale),
            validate_dimensions: self.validate_dimensions.unwrap_or(default.validate_dimensions),
            max_dimension: self.max_dimension.unwrap_or(default.max_dimension),
        }
    }
}

/// Outcome of one successful file conversion.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub metadata: EmbedReport,
    pub timestamps_applied: bool,
    /// Non-terminal problems, already logged as warnings
    pub warnings: Vec<String>,
    pub timings: PipelineTimings,
}

/// Outcome of a directory conversion in which every file succeeded.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub converted: Vec<ConversionReport>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.converted.len()
    }
}
