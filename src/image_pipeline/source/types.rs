//! Decoded image data types

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::metadata::types::MetadataBundle;

/// Decoded, row-major, interleaved pixel data.
///
/// The backing array always holds exactly
/// `width * height * channels * bit_depth / 8` bytes. The buffer is read-only
/// once built; conversions such as [`RawImageBuffer::flatten_alpha`] produce a
/// new buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImageBuffer {
    width: u32,
    height: u32,
    /// 1 = gray, 2 = gray + alpha, 3 = RGB, 4 = RGBA
    channels: u8,
    bit_depth: u8,
    data: Vec<u8>,
}

impl RawImageBuffer {
    pub fn new(width: u32, height: u32, channels: u8, bit_depth: u8, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ConversionError::InvalidDimensions(width, height));
        }
        if !(1..=4).contains(&channels) {
            return Err(ConversionError::InvalidInput(format!(
                "channel count must be 1-4, got {}",
                channels
            )));
        }
        if bit_depth != 8 && bit_depth != 16 {
            return Err(ConversionError::InvalidInput(format!(
                "unsupported bit depth {}",
                bit_depth
            )));
        }
        let expected = Self::expected_len(width, height, channels, bit_depth).ok_or_else(|| {
            ConversionError::MemoryAllocation(format!("{}x{} image is too large", width, height))
        })?;
        if data.len() != expected {
            return Err(ConversionError::InvalidInput(format!(
                "buffer holds {} bytes, {}x{}x{} at {} bits needs {}",
                data.len(),
                width,
                height,
                channels,
                bit_depth,
                expected
            )));
        }

        Ok(Self {
            width,
            height,
            channels,
            bit_depth,
            data,
        })
    }

    /// Builds an 8-bit buffer from a decoded plane whose rows are `stride`
    /// bytes apart. Only `width * channels` bytes of each row are copied, so
    /// alignment padding never reaches the logical buffer.
    pub fn from_strided(
        width: u32,
        height: u32,
        channels: u8,
        plane: &[u8],
        stride: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ConversionError::InvalidDimensions(width, height));
        }
        let row_len = width as usize * channels as usize;
        if stride < row_len {
            return Err(ConversionError::DecodingFailed(format!(
                "plane stride {} is smaller than row size {}",
                stride, row_len
            )));
        }
        let needed = (height as usize - 1) * stride + row_len;
        if plane.len() < needed {
            return Err(ConversionError::DecodingFailed(format!(
                "plane holds {} bytes, {} rows of stride {} need {}",
                plane.len(),
                height,
                stride,
                needed
            )));
        }

        let mut data = Vec::new();
        data.try_reserve_exact(row_len * height as usize)
            .map_err(|e| ConversionError::MemoryAllocation(e.to_string()))?;
        for row in plane.chunks(stride).take(height as usize) {
            data.extend_from_slice(&row[..row_len]);
        }

        Self::new(width, height, channels, 8, data)
    }

    pub fn expected_len(width: u32, height: u32, channels: u8, bit_depth: u8) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(channels as usize)?
            .checked_mul(bit_depth as usize / 8)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn row_len(&self) -> usize {
        self.width as usize * self.channels as usize * (self.bit_depth as usize / 8)
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, u8> {
        self.data.chunks_exact(self.row_len())
    }

    pub fn has_alpha(&self) -> bool {
        self.channels == 2 || self.channels == 4
    }

    pub fn is_panorama(&self) -> bool {
        is_panorama(self.width, self.height)
    }

    /// Composites an 8-bit gray+alpha or RGBA buffer onto white, dropping
    /// the alpha channel. Buffers without alpha are returned as a copy.
    pub fn flatten_alpha(&self) -> Result<RawImageBuffer> {
        if !self.has_alpha() {
            return Ok(self.clone());
        }
        if self.bit_depth != 8 {
            return Err(ConversionError::InvalidInput(
                "alpha flattening needs 8-bit samples".to_string(),
            ));
        }

        let channels = self.channels as usize;
        let color = channels - 1;
        let mut data = Vec::with_capacity(self.data.len() / channels * color);
        for pixel in self.data.chunks_exact(channels) {
            let alpha = pixel[color] as u32;
            for &value in &pixel[..color] {
                let blended = (value as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
                data.push(blended as u8);
            }
        }

        RawImageBuffer::new(self.width, self.height, color as u8, 8, data)
    }

    /// Expands gray+alpha to RGBA. Other layouts are returned as a copy.
    pub fn expand_gray_alpha(&self) -> Result<RawImageBuffer> {
        if self.channels != 2 {
            return Ok(self.clone());
        }
        let sample = self.bit_depth as usize / 8;
        let mut data = Vec::with_capacity(self.data.len() * 2);
        for pixel in self.data.chunks_exact(2 * sample) {
            let (gray, alpha) = pixel.split_at(sample);
            for _ in 0..3 {
                data.extend_from_slice(gray);
            }
            data.extend_from_slice(alpha);
        }
        RawImageBuffer::new(self.width, self.height, 4, self.bit_depth, data)
    }
}

/// One side more than twice the other.
pub fn is_panorama(width: u32, height: u32) -> bool {
    let (w, h) = (width as u64, height as u64);
    w > h * 2 || h > w * 2
}

/// Pixels plus the metadata blocks found in the same container.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub buffer: RawImageBuffer,
    pub metadata: MetadataBundle,
}
