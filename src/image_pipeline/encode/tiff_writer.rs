//! One-row-per-strip TIFF serializer.
//!
//! Compression follows the 0-9 level in coarse buckets: 0 none, 1-3 LZW,
//! 4-6 Deflate, 7-9 Deflate at its best setting. The `tiff` crate has no
//! lossy writer, so the top bucket trades speed for size instead of quality.
//! XMP (tag 700) and IPTC (tag 33723) ride along as byte tags; EXIF would
//! need a sub-IFD and is skipped.

use std::io::Cursor;

use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{colortype, Compression, TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::encode::types::EncodeOptions;
use crate::image_pipeline::metadata::types::{EmbedReport, MetadataBundle, MetadataKind};
use crate::image_pipeline::source::types::RawImageBuffer;

pub const TAG_XMP: u16 = 700;
pub const TAG_IPTC: u16 = 33723;

const ORIENTATION_TOP_LEFT: u16 = 1;
const PLANAR_CONTIGUOUS: u16 = 1;
const EXTRA_SAMPLE_UNASSOCIATED_ALPHA: u16 = 2;

pub fn compression_for_level(level: u8) -> Compression {
    match level {
        0 => Compression::Uncompressed,
        1..=3 => Compression::Lzw,
        4..=6 => Compression::Deflate(DeflateLevel::Balanced),
        _ => Compression::Deflate(DeflateLevel::Best),
    }
}

fn encode_error(e: tiff::TiffError) -> ConversionError {
    ConversionError::EncodingFailed(format!("TIFF: {}", e))
}

fn write_strips<C>(
    encoder: &mut TiffEncoder<Cursor<&mut Vec<u8>>>,
    width: u32,
    height: u32,
    samples: &[C::Inner],
    has_alpha: bool,
    metadata: &MetadataBundle,
    report: &mut EmbedReport,
) -> Result<()>
where
    C: colortype::ColorType,
    [C::Inner]: TiffValue,
{
    let mut image = encoder
        .new_image::<C>(width, height)
        .map_err(encode_error)?;
    image.rows_per_strip(1).map_err(encode_error)?;

    let dir = image.encoder();
    dir.write_tag(Tag::Orientation, ORIENTATION_TOP_LEFT)
        .map_err(encode_error)?;
    dir.write_tag(Tag::PlanarConfiguration, PLANAR_CONTIGUOUS)
        .map_err(encode_error)?;
    if has_alpha {
        dir.write_tag(Tag::ExtraSamples, &[EXTRA_SAMPLE_UNASSOCIATED_ALPHA][..])
            .map_err(encode_error)?;
    }

    for (kind, data) in metadata.iter() {
        let tag = match kind {
            MetadataKind::Xmp => TAG_XMP,
            MetadataKind::Iptc => TAG_IPTC,
            MetadataKind::Exif => {
                report.skip(kind, "EXIF in TIFF needs a sub-IFD writer");
                continue;
            }
        };
        match dir.write_tag(Tag::from_u16_exhaustive(tag), data) {
            Ok(()) => report.embed(kind),
            Err(e) => report.skip(kind, e.to_string()),
        }
    }

    // splits into one-row strips and compresses each one separately
    image.write_data(samples).map_err(encode_error)
}

pub fn encode(image: &RawImageBuffer, options: &EncodeOptions) -> Result<(Vec<u8>, EmbedReport)> {
    // no gray+alpha color type in the encoder
    let expanded;
    let image = if image.channels() == 2 {
        expanded = image.expand_gray_alpha()?;
        &expanded
    } else {
        image
    };

    let compression = compression_for_level(options.compression_level());
    debug!(
        level = options.compression_level(),
        channels = image.channels(),
        "Encoding TIFF"
    );

    let mut buffer = Vec::new();
    let mut report = EmbedReport::default();
    let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
        .map_err(encode_error)?
        .with_compression(compression);

    let (w, h, alpha, metadata) = (
        image.width(),
        image.height(),
        image.has_alpha(),
        options.metadata(),
    );
    match (image.channels(), image.bit_depth()) {
        (1, 8) => write_strips::<colortype::Gray8>(&mut encoder, w, h, image.data(), alpha, metadata, &mut report)?,
        (3, 8) => write_strips::<colortype::RGB8>(&mut encoder, w, h, image.data(), alpha, metadata, &mut report)?,
        (4, 8) => write_strips::<colortype::RGBA8>(&mut encoder, w, h, image.data(), alpha, metadata, &mut report)?,
        (channels, 16) => {
            let samples: Vec<u16> = image
                .data()
                .chunks_exact(2)
                .map(|b| u16::from_ne_bytes([b[0], b[1]]))
                .collect();
            match channels {
                1 => write_strips::<colortype::Gray16>(&mut encoder, w, h, &samples, alpha, metadata, &mut report)?,
                3 => write_strips::<colortype::RGB16>(&mut encoder, w, h, &samples, alpha, metadata, &mut report)?,
                _ => write_strips::<colortype::RGBA16>(&mut encoder, w, h, &samples, alpha, metadata, &mut report)?,
            }
        }
        (channels, _) => {
            return Err(ConversionError::UnsupportedChannels {
                format: "TIFF",
                channels,
            });
        }
    }

    drop(encoder);
    Ok((buffer, report))
}
