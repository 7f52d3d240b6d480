//! Target format and encoder option types

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::image_pipeline::common::error::ConversionError;
use crate::image_pipeline::metadata::types::MetadataBundle;

pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;
pub const MAX_COMPRESSION_LEVEL: u8 = 9;

/// Raster formats the encoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
    Webp,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 5] = [
        OutputFormat::Jpeg,
        OutputFormat::Png,
        OutputFormat::Bmp,
        OutputFormat::Tiff,
        OutputFormat::Webp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Webp => "webp",
        }
    }

    /// Preferred file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }

    /// `explicit` if given, else the destination's extension, else JPEG.
    pub fn resolve(explicit: Option<OutputFormat>, destination: &Path) -> Self {
        explicit
            .or_else(|| Self::from_path(destination))
            .unwrap_or(OutputFormat::Jpeg)
    }

    pub fn accepts_channels(self, channels: u8) -> bool {
        match self {
            OutputFormat::Jpeg => channels == 1 || channels == 3,
            OutputFormat::Webp => channels == 3 || channels == 4,
            OutputFormat::Png | OutputFormat::Bmp | OutputFormat::Tiff => (1..=4).contains(&channels),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "bmp" => Ok(OutputFormat::Bmp),
            "tif" | "tiff" => Ok(OutputFormat::Tiff),
            "webp" => Ok(OutputFormat::Webp),
            other => Err(ConversionError::UnsupportedFormat(format!(
                "output format '{}'",
                other
            ))),
        }
    }
}

/// Which output formats this build can encode. Probed once, then consulted
/// as a flat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatCapabilities {
    available: [bool; OutputFormat::ALL.len()],
}

impl FormatCapabilities {
    pub fn detect() -> Self {
        let mut available = [false; OutputFormat::ALL.len()];
        for (slot, format) in available.iter_mut().zip(OutputFormat::ALL) {
            *slot = match format {
                OutputFormat::Jpeg => cfg!(feature = "jpeg"),
                OutputFormat::Png => cfg!(feature = "png"),
                OutputFormat::Bmp => true,
                OutputFormat::Tiff => cfg!(feature = "tiff"),
                OutputFormat::Webp => cfg!(feature = "webp"),
            };
        }
        Self { available }
    }

    /// Restricts to `formats`. Used to model builds with missing codecs.
    pub fn only(formats: &[OutputFormat]) -> Self {
        let detected = Self::detect();
        let mut available = [false; OutputFormat::ALL.len()];
        for format in formats {
            available[*format as usize] = detected.is_supported(*format);
        }
        Self { available }
    }

    pub fn is_supported(&self, format: OutputFormat) -> bool {
        self.available[format as usize]
    }

    pub fn supported(&self) -> Vec<OutputFormat> {
        OutputFormat::ALL
            .into_iter()
            .filter(|f| self.is_supported(*f))
            .collect()
    }
}

impl Default for FormatCapabilities {
    fn default() -> Self {
        Self::detect()
    }
}

/// Per-encode settings. Quality and compression level are clamped when set,
/// so the getters always return in-range values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    format: OutputFormat,
    quality: u8,
    compression_level: u8,
    progressive: bool,
    interlace: bool,
    lossless: bool,
    metadata: MetadataBundle,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Jpeg,
            quality: 85,
            compression_level: 6,
            progressive: false,
            interlace: false,
            lossless: false,
            metadata: MetadataBundle::new(),
        }
    }
}

impl EncodeOptions {
    pub fn builder() -> EncodeOptionsBuilder {
        EncodeOptionsBuilder::default()
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// 1..=100
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// 0..=9
    pub fn compression_level(&self) -> u8 {
        self.compression_level
    }

    pub fn progressive(&self) -> bool {
        self.progressive
    }

    pub fn interlace(&self) -> bool {
        self.interlace
    }

    pub fn lossless(&self) -> bool {
        self.lossless
    }

    pub fn metadata(&self) -> &MetadataBundle {
        &self.metadata
    }

    pub fn clamp_quality(quality: i32) -> u8 {
        quality.clamp(MIN_QUALITY as i32, MAX_QUALITY as i32) as u8
    }

    pub fn clamp_compression_level(level: i32) -> u8 {
        level.clamp(0, MAX_COMPRESSION_LEVEL as i32) as u8
    }
}

/// Builder for EncodeOptions
#[derive(Default)]
pub struct EncodeOptionsBuilder {
    format: Option<OutputFormat>,
    quality: Option<i32>,
    compression_level: Option<i32>,
    progressive: Option<bool>,
    interlace: Option<bool>,
    lossless: Option<bool>,
    metadata: Option<MetadataBundle>,
}

impl EncodeOptionsBuilder {
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

    pub fn metadata(mut self, metadata: MetadataBundle) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn build(self) -> EncodeOptions {
        let default = EncodeOptions::default();
        EncodeOptions {
            format: self.format.unwrap_or(default.format),
            quality: self
                .quality
                .map(EncodeOptions::clamp_quality)
                .unwrap_or(default.quality),
            compression_level: self
                .compression_level
                .map(EncodeOptions::clamp_compression_level)
                .unwrap_or(default.compression_level),
            progressive: self.progressive.unwrap_or(default.progressive),
            interlace: self.interlace.unwrap_or(default.interlace),
            lossless: self.lossless.unwrap_or(default.lossless),
            metadata: self.metadata.unwrap_or(default.metadata),
        }
    }
}
