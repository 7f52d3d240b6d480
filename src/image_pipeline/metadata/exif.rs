use crate::image_pipeline::common::error::{ConversionError, Result};

/// Identifier that prefixes EXIF payloads in JPEG APP1 segments.
pub const EXIF_IDENTIFIER: &[u8; 6] = b"Exif\0\0";

/// Turns the payload of a HEIF `Exif` item into a bare TIFF-structured blob.
///
/// HEIF stores a 4-byte big-endian offset in front of the TIFF header, and
/// some writers also keep the JPEG-style `Exif\0\0` identifier. Both are
/// skipped; the remaining bytes are returned untouched.
pub fn normalize_heif_exif(item: &[u8]) -> Result<Vec<u8>> {
    if item.len() < 4 {
        return Err(ConversionError::MetadataExtraction(format!(
            "EXIF item too short: {} bytes",
            item.len()
        )));
    }

    let offset = u32::from_be_bytes([item[0], item[1], item[2], item[3]]) as usize;
    let start = 4usize.checked_add(offset).filter(|s| *s <= item.len()).ok_or_else(|| {
        ConversionError::MetadataExtraction(format!(
            "EXIF header offset {} exceeds item size {}",
            offset,
            item.len()
        ))
    })?;

    Ok(strip_exif_identifier(&item[start..]).to_vec())
}

pub fn strip_exif_identifier(data: &[u8]) -> &[u8] {
    data.strip_prefix(&EXIF_IDENTIFIER[..]).unwrap_or(data)
}
