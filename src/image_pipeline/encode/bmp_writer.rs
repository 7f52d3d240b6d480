//! Uncompressed BMP serializer.
//!
//! Layout: 14-byte file header, 40-byte BITMAPINFOHEADER, then bottom-up
//! BGR(A) rows padded to 4 bytes. Gray input is widened to BGR (and gray +
//! alpha to BGRA) so the file never needs a palette and the pixel data always
//! starts at offset 54.

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::metadata::types::{EmbedReport, MetadataBundle};
use crate::image_pipeline::source::types::RawImageBuffer;

pub const FILE_HEADER_LEN: usize = 14;
pub const INFO_HEADER_LEN: usize = 40;
pub const PIXEL_DATA_OFFSET: usize = FILE_HEADER_LEN + INFO_HEADER_LEN;

/// ~72 DPI
const PIXELS_PER_METER: i32 = 2835;

/// Bytes per stored row, padded to a 4-byte boundary.
pub fn padded_row_len(width: u32, bytes_per_pixel: usize) -> usize {
    (width as usize * bytes_per_pixel).div_ceil(4) * 4
}

fn stored_bytes_per_pixel(channels: u8) -> usize {
    match channels {
        1 | 3 => 3,
        _ => 4,
    }
}

fn push_bgr(row: &mut Vec<u8>, pixel: &[u8]) {
    match *pixel {
        [g] => row.extend_from_slice(&[g, g, g]),
        [g, a] => row.extend_from_slice(&[g, g, g, a]),
        [r, g, b] => row.extend_from_slice(&[b, g, r]),
        [r, g, b, a] => row.extend_from_slice(&[b, g, r, a]),
        _ => {}
    }
}

pub fn encode(image: &RawImageBuffer, metadata: &MetadataBundle) -> Result<(Vec<u8>, EmbedReport)> {
    if image.bit_depth() != 8 {
        return Err(ConversionError::InvalidInput(format!(
            "BMP needs 8-bit samples, got {}",
            image.bit_depth()
        )));
    }
    let width = i32::try_from(image.width())
        .map_err(|_| ConversionError::InvalidDimensions(image.width(), image.height()))?;
    let height = i32::try_from(image.height())
        .map_err(|_| ConversionError::InvalidDimensions(image.width(), image.height()))?;

    let channels = image.channels() as usize;
    let bytes_per_pixel = stored_bytes_per_pixel(image.channels());
    let row_len = padded_row_len(image.width(), bytes_per_pixel);
    let image_size = row_len
        .checked_mul(image.height() as usize)
        .filter(|size| size + PIXEL_DATA_OFFSET <= u32::MAX as usize)
        .ok_or_else(|| {
            ConversionError::EncodingFailed(format!(
                "{}x{} exceeds the 4 GiB BMP limit",
                image.width(),
                image.height()
            ))
        })?;
    let file_size = PIXEL_DATA_OFFSET + image_size;

    let mut out = Vec::new();
    out.try_reserve_exact(file_size)
        .map_err(|e| ConversionError::MemoryAllocation(e.to_string()))?;

    // BITMAPFILEHEADER
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&(PIXEL_DATA_OFFSET as u32).to_le_bytes());

    // BITMAPINFOHEADER, positive height = bottom-up
    out.extend_from_slice(&(INFO_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&((bytes_per_pixel * 8) as u16).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
    out.extend_from_slice(&(image_size as u32).to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METER.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let mut row = Vec::with_capacity(row_len);
    for source_row in image.rows().rev() {
        row.clear();
        for pixel in source_row.chunks_exact(channels) {
            push_bgr(&mut row, pixel);
        }
        row.resize(row_len, 0);
        out.extend_from_slice(&row);
    }

    let mut report = EmbedReport::default();
    report.skip_all(metadata, "BMP cannot carry metadata");
    Ok((out, report))
}

fn le_u16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn le_u32(data: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

fn le_i32(data: &[u8], at: usize) -> Option<i32> {
    Some(i32::from_le_bytes(data.get(at..at + 4)?.try_into().ok()?))
}

/// Reads back an uncompressed 24/32-bit BMP into RGB(A), skipping row
/// padding. Handles both bottom-up and top-down files.
pub fn decode(data: &[u8]) -> Result<RawImageBuffer> {
    let malformed = |what: &str| ConversionError::DecodingFailed(format!("BMP: {}", what));

    if !data.starts_with(b"BM") {
        return Err(malformed("missing BM signature"));
    }
    let offset = le_u32(data, 10).ok_or_else(|| malformed("truncated file header"))? as usize;
    let width = le_i32(data, 18).ok_or_else(|| malformed("truncated info header"))?;
    let height = le_i32(data, 22).ok_or_else(|| malformed("truncated info header"))?;
    let bpp = le_u16(data, 28).ok_or_else(|| malformed("truncated info header"))?;
    let compression = le_u32(data, 30).ok_or_else(|| malformed("truncated info header"))?;

    if compression != 0 {
        return Err(malformed("compressed BMP"));
    }
    let bytes_per_pixel = match bpp {
        24 => 3,
        32 => 4,
        other => return Err(malformed(&format!("{} bits per pixel", other))),
    };
    if width <= 0 || height == 0 {
        return Err(ConversionError::InvalidDimensions(
            width.unsigned_abs(),
            height.unsigned_abs(),
        ));
    }
    let (width, bottom_up) = (width as u32, height > 0);
    let height = height.unsigned_abs();
    let row_len = padded_row_len(width, bytes_per_pixel);

    let pixels = data
        .get(offset..)
        .filter(|p| p.len() >= row_len * height as usize)
        .ok_or_else(|| malformed("pixel data truncated"))?;

    let mut rgb = Vec::with_capacity(width as usize * height as usize * bytes_per_pixel);
    for y in 0..height as usize {
        let stored = if bottom_up { height as usize - 1 - y } else { y };
        let row = &pixels[stored * row_len..stored * row_len + width as usize * bytes_per_pixel];
        for px in row.chunks_exact(bytes_per_pixel) {
            rgb.extend_from_slice(&[px[2], px[1], px[0]]);
            if bytes_per_pixel == 4 {
                rgb.push(px[3]);
            }
        }
    }

    RawImageBuffer::new(width, height, bytes_per_pixel as u8, 8, rgb)
}
