use tracing::debug;
use webp::Encoder;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::encode::types::EncodeOptions;
use crate::image_pipeline::metadata::types::EmbedReport;
use crate::image_pipeline::metadata::webp::attach_chunks;
use crate::image_pipeline::source::types::RawImageBuffer;

pub fn encode(image: &RawImageBuffer, options: &EncodeOptions) -> Result<(Vec<u8>, EmbedReport)> {
    if image.bit_depth() != 8 {
        return Err(ConversionError::InvalidInput(format!(
            "WebP needs 8-bit samples, got {}",
            image.bit_depth()
        )));
    }
    let encoder = match image.channels() {
        3 => Encoder::from_rgb(image.data(), image.width(), image.height()),
        4 => Encoder::from_rgba(image.data(), image.width(), image.height()),
        channels => {
            return Err(ConversionError::UnsupportedChannels {
                format: "WebP",
                channels,
            });
        }
    };

    debug!(
        quality = options.quality(),
        lossless = options.lossless(),
        "Encoding WebP"
    );
    let encoded = encoder
        .encode_simple(options.lossless(), options.quality() as f32)
        .map_err(|e| ConversionError::EncodingFailed(format!("WebP: {:?}", e)))?;
    let webp = encoded.to_vec();

    let metadata = options.metadata();
    if metadata.is_empty() {
        return Ok((webp, EmbedReport::default()));
    }
    match attach_chunks(&webp, metadata, image.width(), image.height(), image.has_alpha()) {
        Ok(embedded) => Ok(embedded),
        Err(e) => {
            let mut report = EmbedReport::default();
            report.skip_all(metadata, &e.to_string());
            Ok((webp, report))
        }
    }
}
