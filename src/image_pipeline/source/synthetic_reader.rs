//! Gradient test-pattern decoder.
//!
//! Never part of a production build: compiled only for tests or with the
//! `synthetic` feature, for pipeline smoke tests on machines without a
//! working HEIF codec.

use tracing::warn;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::metadata::types::MetadataBundle;
use crate::image_pipeline::source::reader::SourceDecoder;
use crate::image_pipeline::source::types::RawImageBuffer;

pub const SYNTHETIC_SIZE: u32 = 100;

/// Ignores its input and produces a 100x100 RGB gradient:
/// red follows x, green follows y, blue is fixed at 128.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticDecoder;

impl SyntheticDecoder {
    pub fn gradient(width: u32, height: u32) -> Result<RawImageBuffer> {
        if width == 0 || height == 0 {
            return Err(ConversionError::InvalidDimensions(width, height));
        }
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            let g = (y * 255 / height) as u8;
            for x in 0..width {
                data.extend_from_slice(&[(x * 255 / width) as u8, g, 128]);
            }
        }
        RawImageBuffer::new(width, height, 3, 8, data)
    }
}

impl SourceDecoder for SyntheticDecoder {
    fn decode(&self, _data: &[u8]) -> Result<RawImageBuffer> {
        Self::gradient(SYNTHETIC_SIZE, SYNTHETIC_SIZE)
    }

    fn extract_metadata(&self, _data: &[u8]) -> Result<MetadataBundle> {
        Ok(MetadataBundle::new())
    }
}

/// Tries `primary` first and substitutes the gradient when it fails with a
/// decode or codec error. Input errors still propagate.
pub struct FallbackDecoder<D: SourceDecoder> {
    primary: D,
}

impl<D: SourceDecoder> FallbackDecoder<D> {
    pub fn new(primary: D) -> Self {
        Self { primary }
    }
}

impl<D: SourceDecoder> SourceDecoder for FallbackDecoder<D> {
    fn decode(&self, data: &[u8]) -> Result<RawImageBuffer> {
        match self.primary.decode(data) {
            Err(e @ (ConversionError::DecodingFailed(_) | ConversionError::CodecInitialization(_))) => {
                warn!("Primary decoder failed ({}), substituting synthetic gradient", e);
                SyntheticDecoder.decode(data)
            }
            other => other,
        }
    }

    fn extract_metadata(&self, data: &[u8]) -> Result<MetadataBundle> {
        self.primary
            .extract_metadata(data)
            .or_else(|_| Ok(MetadataBundle::new()))
    }
}
