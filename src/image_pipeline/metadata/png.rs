//! PNG auxiliary chunk insertion.
//!
//! EXIF is only annotated: a `tEXt` chunk records that a block of a given
//! size existed. The EXIF bytes themselves are not carried over, so this is
//! not a lossless round trip. XMP goes into the standard `iTXt` chunk.

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::metadata::types::{EmbedReport, MetadataBundle, MetadataKind};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
/// Signature plus the fixed-size IHDR chunk (length, type, 13 data bytes, CRC).
const IHDR_END: usize = 8 + 4 + 4 + 13 + 4;

pub const EXIF_TEXT_KEYWORD: &str = "EXIF";
pub const XMP_ITXT_KEYWORD: &str = "XML:com.adobe.xmp";

pub fn write_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);

    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}

pub fn text_chunk_data(keyword: &str, text: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(keyword.len() + 1 + text.len());
    data.extend_from_slice(keyword.as_bytes());
    data.push(0);
    data.extend_from_slice(text.as_bytes());
    data
}

/// Uncompressed iTXt with empty language tag and translated keyword.
pub fn itxt_chunk_data(keyword: &str, text: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(keyword.len() + 5 + text.len());
    data.extend_from_slice(keyword.as_bytes());
    data.extend_from_slice(&[0, 0, 0, 0, 0]);
    data.extend_from_slice(text);
    data
}

pub fn exif_annotation(exif_len: usize) -> String {
    format!("EXIF data present ({} bytes)", exif_len)
}

/// Inserts metadata chunks right after IHDR.
pub fn insert_chunks(png: &[u8], bundle: &MetadataBundle) -> Result<(Vec<u8>, EmbedReport)> {
    if png.len() < IHDR_END || png[..8] != PNG_SIGNATURE || &png[12..16] != b"IHDR" {
        return Err(ConversionError::MetadataWriting(
            "PNG stream does not start with a signature and IHDR chunk".to_string(),
        ));
    }

    let mut report = EmbedReport::default();
    let mut chunks = Vec::new();

    for (kind, data) in bundle.iter() {
        match kind {
            MetadataKind::Exif => {
                let text = exif_annotation(data.len());
                write_chunk(&mut chunks, b"tEXt", &text_chunk_data(EXIF_TEXT_KEYWORD, &text));
                report.embed(kind);
            }
            MetadataKind::Xmp => {
                write_chunk(&mut chunks, b"iTXt", &itxt_chunk_data(XMP_ITXT_KEYWORD, data));
                report.embed(kind);
            }
            MetadataKind::Iptc => report.skip(kind, "PNG has no standard IPTC chunk"),
        }
    }

    let mut out = Vec::with_capacity(png.len() + chunks.len());
    out.extend_from_slice(&png[..IHDR_END]);
    out.extend_from_slice(&chunks);
    out.extend_from_slice(&png[IHDR_END..]);
    Ok((out, report))
}

/// Type and data of every chunk in a PNG stream, CRCs verified.
pub fn read_chunks(png: &[u8]) -> Result<Vec<([u8; 4], &[u8])>> {
    if png.len() < 8 || png[..8] != PNG_SIGNATURE {
        return Err(ConversionError::InvalidInput("missing PNG signature".to_string()));
    }
    let mut chunks = Vec::new();
    let mut pos = 8;
    while pos + 12 <= png.len() {
        let len = u32::from_be_bytes([png[pos], png[pos + 1], png[pos + 2], png[pos + 3]]) as usize;
        let end = pos + 12 + len;
        if end > png.len() {
            return Err(ConversionError::InvalidInput("truncated PNG chunk".to_string()));
        }
        let chunk_type = [png[pos + 4], png[pos + 5], png[pos + 6], png[pos + 7]];
        let data = &png[pos + 8..pos + 8 + len];
        let stored = u32::from_be_bytes([png[end - 4], png[end - 3], png[end - 2], png[end - 1]]);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&chunk_type);
        hasher.update(data);
        if hasher.finalize() != stored {
            return Err(ConversionError::InvalidInput(format!(
                "CRC mismatch in {} chunk",
                String::from_utf8_lossy(&chunk_type)
            )));
        }
        chunks.push((chunk_type, data));
        pos = end;
    }
    Ok(chunks)
}
