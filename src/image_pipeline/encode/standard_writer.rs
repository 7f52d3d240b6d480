use std::io::Write;

use tracing::{debug, warn};

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::encode::bmp_writer;
#[cfg(feature = "jpeg")]
use crate::image_pipeline::encode::jpeg_writer;
#[cfg(feature = "png")]
use crate::image_pipeline::encode::png_writer;
#[cfg(feature = "tiff")]
use crate::image_pipeline::encode::tiff_writer;
use crate::image_pipeline::encode::types::{EncodeOptions, FormatCapabilities, OutputFormat};
#[cfg(feature = "webp")]
use crate::image_pipeline::encode::webp_writer;
use crate::image_pipeline::encode::writer::ImageWriter;
use crate::image_pipeline::metadata::types::EmbedReport;
use crate::image_pipeline::source::types::RawImageBuffer;

/// Dispatches to the per-format serializers compiled into this build.
#[derive(Debug, Clone, Default)]
pub struct StandardImageWriter {
    capabilities: FormatCapabilities,
}

impl StandardImageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: FormatCapabilities) -> Self {
        Self { capabilities }
    }

    pub fn capabilities(&self) -> &FormatCapabilities {
        &self.capabilities
    }

    fn validate(&self, image: &RawImageBuffer, format: OutputFormat) -> Result<()> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ConversionError::InvalidDimensions(image.width(), image.height()));
        }
        if !(1..=4).contains(&image.channels()) {
            return Err(ConversionError::InvalidInput(format!(
                "channel count must be 1-4, got {}",
                image.channels()
            )));
        }
        if !self.capabilities.is_supported(format) {
            return Err(ConversionError::UnsupportedFormat(format!(
                "{} encoding is not available in this build",
                format
            )));
        }
        Ok(())
    }

    fn serialize(
        &self,
        image: &RawImageBuffer,
        options: &EncodeOptions,
    ) -> Result<(Vec<u8>, EmbedReport)> {
        match options.format() {
            OutputFormat::Bmp => bmp_writer::encode(image, options.metadata()),
            #[cfg(feature = "jpeg")]
            OutputFormat::Jpeg => jpeg_writer::encode(image, options),
            #[cfg(feature = "png")]
            OutputFormat::Png => png_writer::encode(image, options),
            #[cfg(feature = "tiff")]
            OutputFormat::Tiff => tiff_writer::encode(image, options),
            #[cfg(feature = "webp")]
            OutputFormat::Webp => webp_writer::encode(image, options),
            #[allow(unreachable_patterns)]
            other => Err(ConversionError::UnsupportedFormat(format!(
                "{} encoding is not compiled in",
                other
            ))),
        }
    }
}

impl ImageWriter for StandardImageWriter {
    fn write_image(
        &self,
        image: &RawImageBuffer,
        output: &mut dyn Write,
        options: &EncodeOptions,
    ) -> Result<EmbedReport> {
        let format = options.format();
        self.validate(image, format)?;
        debug!(
            %format,
            width = image.width(),
            height = image.height(),
            channels = image.channels(),
            "Encoding image"
        );

        let (bytes, report) = self.serialize(image, options)?;
        output.write_all(&bytes)?;

        for (kind, reason) in &report.skipped {
            warn!(%kind, %format, "Metadata not written: {}", reason);
        }
        debug!(bytes = bytes.len(), embedded = ?report.embedded, "Encoding complete");
        Ok(report)
    }

    fn supported_formats(&self) -> Vec<OutputFormat> {
        self.capabilities.supported()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn rgb() -> RawImageBuffer {
        RawImageBuffer::new(10, 10, 3, 8, vec![128; 300]).unwrap()
    }

    #[test]
    fn test_bmp_end_to_end_size() {
        let writer = StandardImageWriter::new();
        let options = EncodeOptions::builder().format(OutputFormat::Bmp).build();
        let mut out = Cursor::new(Vec::new());
        writer.write_image(&rgb(), &mut out, &options).unwrap();

        let bytes = out.into_inner();
        assert_eq!(bytes.len(), 374);
        assert_eq!(&bytes[..2], b"BM");
    }

    #[test]
    fn test_unavailable_format_writes_nothing() {
        let writer = StandardImageWriter::with_capabilities(FormatCapabilities::only(&[OutputFormat::Bmp]));
        let options = EncodeOptions::builder().format(OutputFormat::Png).build();
        let mut out = Cursor::new(Vec::new());

        let result = writer.write_image(&rgb(), &mut out, &options);
        assert!(matches!(result, Err(ConversionError::UnsupportedFormat(_))));
        assert!(out.into_inner().is_empty());
        assert_eq!(writer.supported_formats(), vec![OutputFormat::Bmp]);
    }

    #[test]
    fn test_write_file_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("nested/out.bmp");
        let writer = StandardImageWriter::new();

        let bad = EncodeOptions::builder().format(OutputFormat::Bmp).build();
        let wide = RawImageBuffer::new(1, 1, 3, 16, vec![0; 6]).unwrap();
        assert!(writer.write_file(&wide, &destination, &bad).is_err());
        assert!(!destination.exists());
        assert_eq!(std::fs::read_dir(dir.path().join("nested")).unwrap().count(), 0);

        writer.write_file(&rgb(), &destination, &bad).unwrap();
        assert_eq!(std::fs::metadata(&destination).unwrap().len(), 374);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_file_uses_umask_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.bin");
        std::fs::write(&plain, b"x").unwrap();
        let destination = dir.path().join("out.bmp");
        let options = EncodeOptions::builder().format(OutputFormat::Bmp).build();

        StandardImageWriter::new()
            .write_file(&rgb(), &destination, &options)
            .unwrap();

        let mode = |p: &std::path::Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&destination), mode(&plain));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_file_keeps_replaced_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("out.bmp");
        std::fs::write(&destination, b"old").unwrap();
        std::fs::set_permissions(&destination, std::fs::Permissions::from_mode(0o640)).unwrap();
        let options = EncodeOptions::builder().format(OutputFormat::Bmp).build();

        StandardImageWriter::new()
            .write_file(&rgb(), &destination, &options)
            .unwrap();

        let metadata = std::fs::metadata(&destination).unwrap();
        assert_eq!(metadata.len(), 374);
        assert_eq!(metadata.permissions().mode() & 0o777, 0o640);
    }

    #[cfg(feature = "jpeg")]
    #[test]
    fn test_jpeg_rejects_rgba_before_writing() {
        let writer = StandardImageWriter::new();
        let rgba = RawImageBuffer::new(2, 2, 4, 8, vec![0; 16]).unwrap();
        let mut out = Cursor::new(Vec::new());
        let result = writer.write_image(&rgba, &mut out, &EncodeOptions::default());
        assert!(matches!(result, Err(ConversionError::UnsupportedChannels { .. })));
        assert!(out.into_inner().is_empty());
    }
}
