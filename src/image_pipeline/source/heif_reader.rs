//! HEIF/HEIC/AVIF decoder backed by libheif.
//!
//! The codec is only linked with the `heif` feature. Without it the decoder
//! still performs the container checks and then reports
//! [`ConversionError::CodecInitialization`].
//!
//! libheif contexts, handles and images are released by their `Drop` impls,
//! so every early return below frees whatever was acquired so far.

#[cfg(feature = "heif")]
use tracing::{debug, info, warn};

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::metadata::types::MetadataBundle;
use crate::image_pipeline::source::container;
use crate::image_pipeline::source::reader::SourceDecoder;
use crate::image_pipeline::source::types::RawImageBuffer;

#[cfg(feature = "heif")]
use libheif_rs::{ColorSpace, HeifContext, ImageHandle, LibHeif, RgbChroma};

#[cfg(feature = "heif")]
use crate::image_pipeline::metadata::{exif::normalize_heif_exif, types::MetadataKind};

#[cfg(feature = "heif")]
const XMP_CONTENT_TYPE: &str = "application/rdf+xml";

/// Decodes the primary image of a HEIF container to 8-bit interleaved RGB or
/// RGBA.
#[derive(Debug, Clone, Default)]
pub struct HeifDecoder {
    /// Refuse images with a side longer than this before allocating pixels.
    max_dimension: Option<u32>,
}

impl HeifDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_dimension(max_dimension: Option<u32>) -> Self {
        Self { max_dimension }
    }

    pub fn is_available() -> bool {
        cfg!(feature = "heif")
    }

    fn check_dimensions(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(ConversionError::InvalidDimensions(width, height));
        }
        if let Some(max) = self.max_dimension {
            if width > max || height > max {
                return Err(ConversionError::InvalidDimensions(width, height));
            }
        }
        Ok(())
    }
}

#[cfg(feature = "heif")]
fn codec_error(stage: &str, e: libheif_rs::HeifError) -> ConversionError {
    ConversionError::DecodingFailed(format!("{}: {}", stage, e))
}

#[cfg(feature = "heif")]
impl HeifDecoder {
    fn read_block(handle: &ImageHandle, id: libheif_rs::ItemId, kind: &str) -> Option<Vec<u8>> {
        match handle.metadata(id) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                warn!("Skipping unreadable {} block {}: {}", kind, id, e);
                None
            }
        }
    }
}

impl SourceDecoder for HeifDecoder {
    #[cfg(feature = "heif")]
    fn decode(&self, data: &[u8]) -> Result<RawImageBuffer> {
        container::check_signature(data)?;
        debug!("Decoding HEIF container, {} bytes", data.len());

        let ctx = HeifContext::read_from_bytes(data).map_err(|e| codec_error("read container", e))?;
        let handle = ctx
            .primary_image_handle()
            .map_err(|e| codec_error("primary image handle", e))?;

        let (width, height) = (handle.width(), handle.height());
        self.check_dimensions(width, height)?;

        let has_alpha = handle.has_alpha_channel();
        let channels: u8 = if has_alpha { 4 } else { 3 };
        if super::types::is_panorama(width, height) {
            info!(width, height, "Panorama aspect ratio detected");
        }

        let chroma = if has_alpha {
            RgbChroma::Rgba
        } else {
            RgbChroma::Rgb
        };
        let image = LibHeif::new()
            .decode(&handle, ColorSpace::Rgb(chroma), None)
            .map_err(|e| codec_error("decode image", e))?;

        let planes = image.planes();
        let plane = planes.interleaved.ok_or_else(|| {
            ConversionError::DecodingFailed("decoded image has no interleaved plane".to_string())
        })?;

        debug!(
            width,
            height,
            channels,
            stride = plane.stride,
            "Copying decoded rows"
        );
        RawImageBuffer::from_strided(width, height, channels, plane.data, plane.stride)
    }

    #[cfg(not(feature = "heif"))]
    fn decode(&self, data: &[u8]) -> Result<RawImageBuffer> {
        container::check_signature(data)?;
        Err(ConversionError::CodecInitialization(
            "HEIF decoding requires the `heif` feature".to_string(),
        ))
    }

    #[cfg(feature = "heif")]
    fn extract_metadata(&self, data: &[u8]) -> Result<MetadataBundle> {
        let ctx = HeifContext::read_from_bytes(data)
            .map_err(|e| ConversionError::MetadataExtraction(e.to_string()))?;
        let handle = ctx
            .primary_image_handle()
            .map_err(|e| ConversionError::MetadataExtraction(e.to_string()))?;

        let mut bundle = MetadataBundle::new();

        if let Some(item) = handle
            .metadata_block_ids(b"Exif")
            .into_iter()
            .find_map(|id| Self::read_block(&handle, id, "EXIF"))
        {
            match normalize_heif_exif(&item) {
                Ok(exif) => bundle = bundle.with_block(MetadataKind::Exif, exif),
                Err(e) => warn!("Dropping EXIF block: {}", e),
            }
        }

        let xmp = handle
            .metadata_block_ids(b"mime")
            .into_iter()
            .filter(|id| handle.metadata_content_type(*id) == Some(XMP_CONTENT_TYPE))
            .find_map(|id| Self::read_block(&handle, id, "XMP"));
        if let Some(xmp) = xmp {
            bundle = bundle.with_block(MetadataKind::Xmp, xmp);
        }

        debug!(
            blocks = bundle.kinds().count(),
            bytes = bundle.total_len(),
            "Extracted container metadata"
        );
        Ok(bundle)
    }

    #[cfg(not(feature = "heif"))]
    fn extract_metadata(&self, _data: &[u8]) -> Result<MetadataBundle> {
        Err(ConversionError::CodecInitialization(
            "HEIF metadata extraction requires the `heif` feature".to_string(),
        ))
    }
}
