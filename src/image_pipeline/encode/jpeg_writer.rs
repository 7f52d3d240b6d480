use jpeg_encoder::{ColorType, Encoder};
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::encode::types::EncodeOptions;
use crate::image_pipeline::metadata::jpeg::inject_segments;
use crate::image_pipeline::metadata::types::EmbedReport;
use crate::image_pipeline::source::types::RawImageBuffer;

fn dimension(value: u32) -> Result<u16> {
    u16::try_from(value).map_err(|_| {
        ConversionError::InvalidInput(format!("{} exceeds the JPEG dimension limit of 65535", value))
    })
}

/// Baseline or progressive JPEG at the clamped quality, metadata segments
/// right after SOI.
///
/// Only gray and RGB input is accepted; alpha has to be flattened by the
/// caller.
pub fn encode(image: &RawImageBuffer, options: &EncodeOptions) -> Result<(Vec<u8>, EmbedReport)> {
    let color = match image.channels() {
        1 => ColorType::Luma,
        3 => ColorType::Rgb,
        channels => {
            return Err(ConversionError::UnsupportedChannels {
                format: "JPEG",
                channels,
            });
        }
    };
    if image.bit_depth() != 8 {
        return Err(ConversionError::InvalidInput(format!(
            "JPEG needs 8-bit samples, got {}",
            image.bit_depth()
        )));
    }
    let (width, height) = (dimension(image.width())?, dimension(image.height())?);

    debug!(
        quality = options.quality(),
        progressive = options.progressive(),
        "Encoding JPEG"
    );
    let mut scans = Vec::new();
    let mut encoder = Encoder::new(&mut scans, options.quality());
    encoder.set_progressive(options.progressive());
    encoder
        .encode(image.data(), width, height, color)
        .map_err(|e| ConversionError::EncodingFailed(format!("JPEG: {}", e)))?;

    let metadata = options.metadata();
    if metadata.is_empty() {
        return Ok((scans, EmbedReport::default()));
    }
    match inject_segments(&scans, metadata) {
        Ok(embedded) => Ok(embedded),
        Err(e) => {
            let mut report = EmbedReport::default();
            report.skip_all(metadata, &e.to_string());
            Ok((scans, report))
        }
    }
}
