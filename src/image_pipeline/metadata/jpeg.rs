//! JPEG application segment injection.
//!
//! Segments are spliced directly after the SOI marker, ahead of the JFIF
//! header and the compressed scan, which is where EXIF readers look for them.

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::metadata::exif::EXIF_IDENTIFIER;
use crate::image_pipeline::metadata::types::{EmbedReport, MetadataBundle, MetadataKind};

const SOI: [u8; 2] = [0xFF, 0xD8];
pub const APP1: u8 = 0xE1;
pub const APP13: u8 = 0xED;

/// Largest payload a segment can carry: the 16-bit length includes itself.
pub const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

pub const XMP_IDENTIFIER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";
const PHOTOSHOP_IDENTIFIER: &[u8] = b"Photoshop 3.0\0";
const IPTC_RESOURCE_ID: u16 = 0x0404;

/// Appends one `FF xx len payload` segment to `out`.
pub fn write_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) -> Result<()> {
    if payload.len() > MAX_SEGMENT_PAYLOAD {
        return Err(ConversionError::MetadataWriting(format!(
            "segment payload of {} bytes exceeds the {} byte JPEG limit",
            payload.len(),
            MAX_SEGMENT_PAYLOAD
        )));
    }
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    Ok(())
}

/// `Exif\0\0` followed by the block exactly as supplied. Bundles coming
/// from the HEIF decoder already hold bare TIFF data.
pub fn exif_payload(exif: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(EXIF_IDENTIFIER.len() + exif.len());
    payload.extend_from_slice(EXIF_IDENTIFIER);
    payload.extend_from_slice(exif);
    payload
}

pub fn xmp_payload(xmp: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(XMP_IDENTIFIER.len() + xmp.len());
    payload.extend_from_slice(XMP_IDENTIFIER);
    payload.extend_from_slice(xmp);
    payload
}

/// Wraps IPTC-IIM records in a Photoshop image resource block (8BIM 0x0404).
pub fn iptc_payload(iptc: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(PHOTOSHOP_IDENTIFIER.len() + 12 + iptc.len() + 1);
    payload.extend_from_slice(PHOTOSHOP_IDENTIFIER);
    payload.extend_from_slice(b"8BIM");
    payload.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
    // empty pascal name, padded to even length
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&(iptc.len() as u32).to_be_bytes());
    payload.extend_from_slice(iptc);
    if iptc.len() % 2 == 1 {
        payload.push(0);
    }
    payload
}

/// Returns `jpeg` with the bundle's blocks inserted after SOI, in EXIF, XMP,
/// IPTC order.
///
/// A block that cannot be written is reported as skipped and the rest are
/// still embedded. Only a stream that does not start with SOI is an error.
pub fn inject_segments(jpeg: &[u8], bundle: &MetadataBundle) -> Result<(Vec<u8>, EmbedReport)> {
    if !jpeg.starts_with(&SOI) {
        return Err(ConversionError::MetadataWriting(
            "JPEG stream does not start with SOI".to_string(),
        ));
    }

    let mut report = EmbedReport::default();
    let mut segments = Vec::with_capacity(bundle.total_len() + 64);

    for (kind, data) in bundle.iter() {
        let (marker, payload) = match kind {
            MetadataKind::Exif => (APP1, exif_payload(data)),
            MetadataKind::Xmp => (APP1, xmp_payload(data)),
            MetadataKind::Iptc => (APP13, iptc_payload(data)),
        };
        match write_segment(&mut segments, marker, &payload) {
            Ok(()) => report.embed(kind),
            Err(e) => report.skip(kind, e.to_string()),
        }
    }

    let mut out = Vec::with_capacity(jpeg.len() + segments.len());
    out.extend_from_slice(&SOI);
    out.extend_from_slice(&segments);
    out.extend_from_slice(&jpeg[SOI.len()..]);
    Ok((out, report))
}

/// Marker and payload of each segment before the first SOS. Used to inspect
/// written files.
pub fn read_segments(jpeg: &[u8]) -> Vec<(u8, &[u8])> {
    let mut segments = Vec::new();
    if !jpeg.starts_with(&SOI) {
        return segments;
    }
    let mut pos = SOI.len();
    while pos + 4 <= jpeg.len() && jpeg[pos] == 0xFF {
        let marker = jpeg[pos + 1];
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        if len < 2 || pos + 2 + len > jpeg.len() {
            break;
        }
        segments.push((marker, &jpeg[pos + 4..pos + 2 + len]));
        // start of scan: entropy-coded data follows
        if marker == 0xDA {
            break;
        }
        pos += 2 + len;
    }
    segments
}
