use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};
use tracing::{debug, warn};

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::encode::types::EncodeOptions;
use crate::image_pipeline::metadata::png::insert_chunks;
use crate::image_pipeline::metadata::types::EmbedReport;
use crate::image_pipeline::source::types::RawImageBuffer;

/// Maps the 0-9 level onto the encoder's three deflate presets.
pub fn compression_for_level(level: u8) -> CompressionType {
    match level {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

fn color_type(channels: u8, bit_depth: u8) -> Option<ExtendedColorType> {
    Some(match (channels, bit_depth) {
        (1, 8) => ExtendedColorType::L8,
        (2, 8) => ExtendedColorType::La8,
        (3, 8) => ExtendedColorType::Rgb8,
        (4, 8) => ExtendedColorType::Rgba8,
        (1, 16) => ExtendedColorType::L16,
        (2, 16) => ExtendedColorType::La16,
        (3, 16) => ExtendedColorType::Rgb16,
        (4, 16) => ExtendedColorType::Rgba16,
        _ => return None,
    })
}

/// PNG with the color type taken from the channel count. 16-bit samples are
/// expected in native byte order.
pub fn encode(image: &RawImageBuffer, options: &EncodeOptions) -> Result<(Vec<u8>, EmbedReport)> {
    let color = color_type(image.channels(), image.bit_depth()).ok_or(
        ConversionError::UnsupportedChannels {
            format: "PNG",
            channels: image.channels(),
        },
    )?;
    if options.interlace() {
        warn!("Adam7 interlacing is not supported by the encoder, writing non-interlaced");
    }

    let compression = compression_for_level(options.compression_level());
    debug!(level = options.compression_level(), ?compression, "Encoding PNG");

    let mut png = Vec::new();
    PngEncoder::new_with_quality(&mut png, compression, FilterType::Adaptive)
        .write_image(image.data(), image.width(), image.height(), color)
        .map_err(|e| ConversionError::EncodingFailed(format!("PNG: {}", e)))?;

    let metadata = options.metadata();
    if metadata.is_empty() {
        return Ok((png, EmbedReport::default()));
    }
    match insert_chunks(&png, metadata) {
        Ok(embedded) => Ok(embedded),
        Err(e) => {
            let mut report = EmbedReport::default();
            report.skip_all(metadata, &e.to_string());
            Ok((png, report))
        }
    }
}
