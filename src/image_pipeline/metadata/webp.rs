//! WebP (RIFF) metadata chunks.
//!
//! EXIF and XMP require the extended `VP8X` layout. Simple lossy (`VP8 `) and
//! lossless (`VP8L`) files are promoted by prepending a `VP8X` header; the
//! metadata chunks are appended after the image data.

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::metadata::exif::strip_exif_identifier;
use crate::image_pipeline::metadata::types::{EmbedReport, MetadataBundle, MetadataKind};

const RIFF_HEADER_LEN: usize = 12;
const VP8X_PAYLOAD_LEN: usize = 10;

const FLAG_ALPHA: u8 = 0x10;
const FLAG_EXIF: u8 = 0x08;
const FLAG_XMP: u8 = 0x04;

/// Largest canvas dimension VP8X can express (24-bit, stored minus one).
const MAX_CANVAS: u32 = 1 << 24;

fn push_chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
}

fn vp8x_payload(flags: u8, width: u32, height: u32) -> [u8; VP8X_PAYLOAD_LEN] {
    let w = (width - 1).to_le_bytes();
    let h = (height - 1).to_le_bytes();
    [flags, 0, 0, 0, w[0], w[1], w[2], h[0], h[1], h[2]]
}

/// Adds EXIF/XMP chunks to an encoded WebP file. IPTC is reported as skipped.
pub fn attach_chunks(
    webp: &[u8],
    bundle: &MetadataBundle,
    width: u32,
    height: u32,
    has_alpha: bool,
) -> Result<(Vec<u8>, EmbedReport)> {
    if webp.len() < RIFF_HEADER_LEN + 8 || &webp[..4] != b"RIFF" || &webp[8..12] != b"WEBP" {
        return Err(ConversionError::MetadataWriting(
            "WebP stream does not start with a RIFF/WEBP header".to_string(),
        ));
    }
    if width == 0 || height == 0 || width > MAX_CANVAS || height > MAX_CANVAS {
        return Err(ConversionError::MetadataWriting(format!(
            "canvas {}x{} cannot be described by VP8X",
            width, height
        )));
    }

    let mut report = EmbedReport::default();
    let mut trailer = Vec::new();
    let mut flags = 0u8;

    if let Some(exif) = bundle.exif() {
        push_chunk(&mut trailer, b"EXIF", strip_exif_identifier(exif));
        flags |= FLAG_EXIF;
        report.embed(MetadataKind::Exif);
    }
    if let Some(xmp) = bundle.xmp() {
        push_chunk(&mut trailer, b"XMP ", xmp);
        flags |= FLAG_XMP;
        report.embed(MetadataKind::Xmp);
    }
    if bundle.iptc().is_some() {
        report.skip(MetadataKind::Iptc, "WebP has no IPTC chunk");
    }

    let body = &webp[RIFF_HEADER_LEN..];
    let mut chunks = Vec::with_capacity(body.len() + trailer.len() + 18);

    if &body[..4] == b"VP8X" {
        chunks.extend_from_slice(body);
        // flags byte is the first payload byte of the leading VP8X chunk
        chunks[8] |= flags;
    } else {
        if has_alpha {
            flags |= FLAG_ALPHA;
        }
        push_chunk(&mut chunks, b"VP8X", &vp8x_payload(flags, width, height));
        chunks.extend_from_slice(body);
    }
    chunks.extend_from_slice(&trailer);

    let mut out = Vec::with_capacity(RIFF_HEADER_LEN + chunks.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((4 + chunks.len()) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(&chunks);
    Ok((out, report))
}

/// FourCC and payload of each top-level chunk.
pub fn read_chunks(webp: &[u8]) -> Vec<([u8; 4], &[u8])> {
    let mut chunks = Vec::new();
    let mut pos = RIFF_HEADER_LEN;
    while pos + 8 <= webp.len() {
        let fourcc = [webp[pos], webp[pos + 1], webp[pos + 2], webp[pos + 3]];
        let len = u32::from_le_bytes([webp[pos + 4], webp[pos + 5], webp[pos + 6], webp[pos + 7]])
            as usize;
        let end = pos + 8 + len;
        if end > webp.len() {
            break;
        }
        chunks.push((fourcc, &webp[pos + 8..end]));
        pos = end + (len % 2);
    }
    chunks
}
