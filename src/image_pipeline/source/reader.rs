use std::path::Path;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::metadata::types::MetadataBundle;
use crate::image_pipeline::source::container;
use crate::image_pipeline::source::types::{DecodedImage, RawImageBuffer};

pub trait SourceDecoder {
    fn decode(&self, data: &[u8]) -> Result<RawImageBuffer>;

    /// EXIF/XMP/IPTC blocks of the container. Missing blocks are not an
    /// error; an empty bundle is returned instead.
    fn extract_metadata(&self, data: &[u8]) -> Result<MetadataBundle>;

    fn decode_with_metadata(&self, data: &[u8]) -> Result<DecodedImage> {
        let buffer = self.decode(data)?;
        let metadata = self.extract_metadata(data)?;
        Ok(DecodedImage { buffer, metadata })
    }

    /// Rejects unsupported extensions before reading or decoding anything.
    fn decode_file(&self, path: &Path) -> Result<DecodedImage> {
        container::validate_input_path(path)?;
        let data = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                ConversionError::ReadPermission(format!("{}: {}", path.display(), e))
            }
            _ => ConversionError::IoError(e),
        })?;
        self.decode_with_metadata(&data)
    }
}
