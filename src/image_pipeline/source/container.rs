//! Input container recognition.
//!
//! Everything here runs before any codec call: the extension allow-list and
//! the ISO-BMFF `ftyp` brand check reject foreign input up front.

use std::path::Path;

use crate::image_pipeline::common::error::{ConversionError, Result};

/// Input extensions accepted regardless of which codecs are compiled in.
pub const SUPPORTED_INPUT_FORMATS: [&str; 6] = ["heic", "heif", "hif", "avci", "avcs", "avif"];

/// Extensions whose containers carry EXIF/XMP items worth querying.
const METADATA_CAPABLE: [&str; 3] = ["heic", "heif", "hif"];

const HEIF_BRANDS: [&[u8; 4]; 14] = [
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"hevm", b"hevs", b"mif1", b"msf1",
    b"mif2", b"avif", b"avis", b"avci",
];

pub fn is_format_supported(name: &str) -> bool {
    let name = name.trim_start_matches('.');
    SUPPORTED_INPUT_FORMATS
        .iter()
        .any(|f| f.eq_ignore_ascii_case(name))
}

pub fn supported_formats() -> &'static [&'static str] {
    &SUPPORTED_INPUT_FORMATS
}

pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn has_supported_extension(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| is_format_supported(&e))
}

pub fn carries_metadata(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| METADATA_CAPABLE.contains(&e.as_str()))
}

/// Existence and extension checks for a conversion source.
pub fn validate_input_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(ConversionError::FileNotFound(path.to_path_buf()));
    }
    if path.is_dir() {
        return Err(ConversionError::InvalidArguments(format!(
            "{} is a directory",
            path.display()
        )));
    }
    match extension_of(path) {
        Some(ext) if is_format_supported(&ext) => Ok(()),
        Some(ext) => Err(ConversionError::UnsupportedFormat(format!(
            "input extension .{} (expected one of {})",
            ext,
            SUPPORTED_INPUT_FORMATS.join(", ")
        ))),
        None => Err(ConversionError::UnsupportedFormat(format!(
            "{} has no extension",
            path.display()
        ))),
    }
}

/// Checks the leading `ftyp` box for a HEIF-family brand.
pub fn check_signature(data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(ConversionError::DecodingFailed("input data is empty".to_string()));
    }
    if data.len() < 16 || &data[4..8] != b"ftyp" {
        return Err(ConversionError::DecodingFailed(
            "not an ISO-BMFF container (missing ftyp box)".to_string(),
        ));
    }

    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    // size 0 means the box runs to the end of the data
    let box_end = match box_size {
        0 => data.len(),
        size => size.clamp(16, data.len()),
    };

    let major = &data[8..12];
    // bytes 12..16 hold the minor version
    let mut brands = std::iter::once(major).chain(data[16..box_end].chunks_exact(4));
    if brands.any(|brand| HEIF_BRANDS.iter().any(|known| &known[..] == brand)) {
        Ok(())
    } else {
        Err(ConversionError::DecodingFailed(format!(
            "unrecognized container brand {:?}",
            String::from_utf8_lossy(major)
        )))
    }
}

#[cfg(test)]
pub(crate) fn ftyp_box(major: &[u8; 4], compatible: &[&[u8; 4]]) -> Vec<u8> {
    let size = 16 + 4 * compatible.len();
    let mut data = (size as u32).to_be_bytes().to_vec();
    data.extend_from_slice(b"ftyp");
    data.extend_from_slice(major);
    data.extend_from_slice(&[0, 0, 0, 0]);
    for brand in compatible {
        data.extend_from_slice(*brand);
    }
    data
}
