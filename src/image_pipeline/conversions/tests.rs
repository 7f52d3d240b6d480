use std::fs::{File, FileTimes};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::image_pipeline::common::error::{ConversionError, ExitCode, Result};
use crate::image_pipeline::conversions::heic_to_raster::HeicConversionPipeline;
use crate::image_pipeline::conversions::types::ConversionConfig;
use crate::image_pipeline::encode::{EncodeOptions, ImageWriter, OutputFormat, StandardImageWriter};
use crate::image_pipeline::metadata::types::{EmbedReport, MetadataBundle, MetadataKind};
use crate::image_pipeline::source::{HeifDecoder, RawImageBuffer, SourceDecoder};

struct MockDecoder {
    should_fail: bool,
    metadata_fails: bool,
    image: RawImageBuffer,
    metadata: MetadataBundle,
    decode_calls: Arc<AtomicUsize>,
    metadata_calls: Arc<AtomicUsize>,
}

impl MockDecoder {
    fn new() -> Self {
        Self {
            should_fail: false,
            metadata_fails: false,
            image: RawImageBuffer::new(4, 4, 3, 8, vec![128; 48]).unwrap(),
            metadata: MetadataBundle::new()
                .with_block(MetadataKind::Exif, b"II*\0\x08\0\0\0".to_vec())
                .with_block(MetadataKind::Xmp, b"<x:xmpmeta/>".to_vec()),
            decode_calls: Arc::new(AtomicUsize::new(0)),
            metadata_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_image(image: RawImageBuffer) -> Self {
        Self {
            image,
            ..Self::new()
        }
    }
}

impl SourceDecoder for MockDecoder {
    fn decode(&self, _data: &[u8]) -> Result<RawImageBuffer> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail {
            return Err(ConversionError::DecodingFailed("Mock decode error".to_string()));
        }
        Ok(self.image.clone())
    }

    fn extract_metadata(&self, _data: &[u8]) -> Result<MetadataBundle> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self.metadata_fails {
            return Err(ConversionError::MetadataExtraction("Mock metadata error".to_string()));
        }
        Ok(self.metadata.clone())
    }
}

#[derive(Default)]
struct MockWriter {
    should_fail: bool,
    written: Arc<Mutex<Vec<(RawImageBuffer, EncodeOptions)>>>,
}

impl ImageWriter for MockWriter {
    fn write_image(
        &self,
        image: &RawImageBuffer,
        output: &mut dyn Write,
        options: &EncodeOptions,
    ) -> Result<EmbedReport> {
        if self.should_fail {
            return Err(ConversionError::EncodingFailed("Mock encode error".to_string()));
        }
        output.write_all(options.format().name().as_bytes())?;
        output.write_all(image.data())?;
        self.written
            .lock()
            .unwrap()
            .push((image.clone(), options.clone()));

        let mut report = EmbedReport::default();
        for kind in options.metadata().kinds() {
            report.embed(kind);
        }
        Ok(report)
    }

    fn supported_formats(&self) -> Vec<OutputFormat> {
        OutputFormat::ALL.to_vec()
    }
}

fn source_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"not really a heic file").unwrap();
    path
}

#[test]
fn test_config_builder() {
    let config = ConversionConfig::builder()
        .format(OutputFormat::Png)
        .quality(150)
        .preserve_gps(false)
        .overwrite(true)
        .validate_dimensions(false)
        .max_dimension(Some(10000))
        .build();

    assert_eq!(config.format, Some(OutputFormat::Png));
    assert!(config.metadata.preserve_exif);
    assert!(!config.metadata.preserve_gps);
    assert!(config.overwrite);
    assert!(!config.validate_dimensions);
    assert_eq!(config.max_dimension, Some(10000));
    assert_eq!(
        config
            .encode_options(OutputFormat::Jpeg, MetadataBundle::new())
            .quality(),
        100
    );
}

#[test]
fn test_config_defaults() {
    let config = ConversionConfig::default();
    assert_eq!(config.quality, 85);
    assert_eq!(config.compression_level, 6);
    assert!(config.preserve_timestamps);
    assert!(!config.overwrite);
    assert_eq!(config.scale, 1.0);
    assert_eq!(config.max_dimension, Some(50_000));
}

#[test]
fn test_successful_conversion() {
    let writer = MockWriter::default();
    let written = writer.written.clone();
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), writer, ConversionConfig::default());

    let mut output = Cursor::new(Vec::new());
    let report = pipeline
        .convert(b"fake heic data", OutputFormat::Png, &mut output)
        .unwrap();

    assert_eq!(written.lock().unwrap().len(), 1);
    assert!(report.is_embedded(MetadataKind::Exif));
    assert!(output.into_inner().starts_with(b"png"));
}

#[test]
fn test_reader_failure() {
    let writer = MockWriter::default();
    let written = writer.written.clone();
    let decoder = MockDecoder {
        should_fail: true,
        ..MockDecoder::new()
    };
    let pipeline = HeicConversionPipeline::with_custom(decoder, writer, ConversionConfig::default());

    let mut output = Cursor::new(Vec::new());
    let result = pipeline.convert(b"fake heic data", OutputFormat::Jpeg, &mut output);

    assert!(matches!(result, Err(ConversionError::DecodingFailed(_))));
    assert!(written.lock().unwrap().is_empty());
}

#[test]
fn test_writer_failure_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = source_file(dir.path(), "photo.heic");
    let output = dir.path().join("photo.jpg");
    let writer = MockWriter {
        should_fail: true,
        ..Default::default()
    };
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), writer, ConversionConfig::default());

    let result = pipeline.convert_file(&input, &output);

    assert!(matches!(result, Err(ConversionError::EncodingFailed(_))));
    assert!(!output.exists());
}

#[test]
fn test_dimension_validation_failure() {
    let decoder = MockDecoder::with_image(RawImageBuffer::new(300, 1, 1, 8, vec![0; 300]).unwrap());
    let config = ConversionConfig::builder().max_dimension(Some(200)).build();
    let pipeline = HeicConversionPipeline::with_custom(decoder, MockWriter::default(), config);

    let result = pipeline.convert(b"data", OutputFormat::Bmp, &mut Cursor::new(Vec::new()));
    assert!(matches!(result, Err(ConversionError::InvalidDimensions(300, 1))));
}

#[test]
fn test_dimension_validation_disabled() {
    let decoder = MockDecoder::with_image(RawImageBuffer::new(300, 1, 1, 8, vec![0; 300]).unwrap());
    let config = ConversionConfig::builder()
        .validate_dimensions(false)
        .max_dimension(Some(200))
        .build();
    let pipeline = HeicConversionPipeline::with_custom(decoder, MockWriter::default(), config);

    let result = pipeline.convert(b"data", OutputFormat::Bmp, &mut Cursor::new(Vec::new()));
    assert!(result.is_ok());
}

#[test]
fn test_unsupported_extension_never_decodes() {
    let dir = tempfile::tempdir().unwrap();
    let input = source_file(dir.path(), "photo.png");
    let decoder = MockDecoder::new();
    let calls = decoder.decode_calls.clone();
    let pipeline = HeicConversionPipeline::with_custom(decoder, MockWriter::default(), ConversionConfig::default());

    let result = pipeline.convert_file(&input, dir.path().join("photo.jpg"));

    let err = result.unwrap_err();
    assert!(matches!(err, ConversionError::UnsupportedFormat(_)));
    assert_eq!(err.exit_code(), ExitCode::UnsupportedFormat);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), MockWriter::default(), ConversionConfig::default());

    let result = pipeline.convert_file(dir.path().join("missing.heic"), dir.path().join("out.jpg"));
    assert!(matches!(result, Err(ConversionError::FileNotFound(_))));
}

#[test]
fn test_existing_destination_requires_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let input = source_file(dir.path(), "photo.heic");
    let output = dir.path().join("photo.bmp");
    std::fs::write(&output, b"keep me").unwrap();

    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), MockWriter::default(), ConversionConfig::default());
    let err = pipeline.convert_file(&input, &output).unwrap_err();
    assert!(matches!(err, ConversionError::OutputExists(_)));
    assert_eq!(err.exit_code(), ExitCode::WritePermission);
    assert_eq!(std::fs::read(&output).unwrap(), b"keep me");

    let config = ConversionConfig::builder().overwrite(true).build();
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), MockWriter::default(), config);
    pipeline.convert_file(&input, &output).unwrap();
    assert!(std::fs::read(&output).unwrap().starts_with(b"bmp"));
}

#[test]
fn test_jpeg_target_flattens_alpha() {
    let rgba = RawImageBuffer::new(1, 1, 4, 8, vec![0, 0, 0, 0]).unwrap();
    let writer = MockWriter::default();
    let written = writer.written.clone();
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::with_image(rgba), writer, ConversionConfig::default());

    pipeline
        .convert(b"data", OutputFormat::Jpeg, &mut Cursor::new(Vec::new()))
        .unwrap();

    let written = written.lock().unwrap();
    assert_eq!(written[0].0.channels(), 3);
    assert_eq!(written[0].0.data(), &[255, 255, 255]);
}

#[test]
fn test_png_target_keeps_alpha() {
    let rgba = RawImageBuffer::new(1, 1, 4, 8, vec![1, 2, 3, 4]).unwrap();
    let writer = MockWriter::default();
    let written = writer.written.clone();
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::with_image(rgba), writer, ConversionConfig::default());

    pipeline
        .convert(b"data", OutputFormat::Png, &mut Cursor::new(Vec::new()))
        .unwrap();
    assert_eq!(written.lock().unwrap()[0].0.channels(), 4);
}

#[test]
fn test_metadata_only_queried_for_capable_sources() {
    let dir = tempfile::tempdir().unwrap();
    let decoder = MockDecoder::new();
    let calls = decoder.metadata_calls.clone();
    let pipeline = HeicConversionPipeline::with_custom(decoder, MockWriter::default(), ConversionConfig::default());

    let avif = source_file(dir.path(), "photo.avif");
    let report = pipeline.convert_file(&avif, dir.path().join("a.png")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(report.metadata.embedded.is_empty());

    let heic = source_file(dir.path(), "photo.heic");
    let report = pipeline.convert_file(&heic, dir.path().join("b.png")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(report.metadata.is_embedded(MetadataKind::Xmp));
}

#[test]
fn test_gps_off_drops_exif_block() {
    let writer = MockWriter::default();
    let written = writer.written.clone();
    let config = ConversionConfig::builder().preserve_gps(false).build();
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), writer, config);

    pipeline
        .convert(b"data", OutputFormat::Jpeg, &mut Cursor::new(Vec::new()))
        .unwrap();

    let written = written.lock().unwrap();
    let metadata = written[0].1.metadata();
    assert!(metadata.exif().is_none());
    assert!(metadata.xmp().is_some());
}

#[test]
fn test_no_metadata_skips_extraction() {
    let decoder = MockDecoder::new();
    let calls = decoder.metadata_calls.clone();
    let config = ConversionConfig::builder().keep_metadata(false).build();
    let pipeline = HeicConversionPipeline::with_custom(decoder, MockWriter::default(), config);

    let report = pipeline
        .convert(b"data", OutputFormat::Jpeg, &mut Cursor::new(Vec::new()))
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(report.embedded.is_empty());
}

#[test]
fn test_metadata_failure_is_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let input = source_file(dir.path(), "photo.heic");
    let decoder = MockDecoder {
        metadata_fails: true,
        ..MockDecoder::new()
    };
    let pipeline = HeicConversionPipeline::with_custom(decoder, MockWriter::default(), ConversionConfig::default());

    let report = pipeline.convert_file(&input, dir.path().join("photo.jpg")).unwrap();
    assert_eq!(report.warnings.len(), 1);
    assert!(report.metadata.embedded.is_empty());
    assert!(dir.path().join("photo.jpg").exists());
}

#[test]
fn test_modification_time_is_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let input = source_file(dir.path(), "photo.heic");
    let output = dir.path().join("out/photo.bmp");

    let past = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    File::options()
        .write(true)
        .open(&input)
        .unwrap()
        .set_times(FileTimes::new().set_modified(past).set_accessed(past))
        .unwrap();

    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), StandardImageWriter::new(), ConversionConfig::default());
    let report = pipeline.convert_file(&input, &output).unwrap();

    assert!(report.timestamps_applied);
    assert_eq!(std::fs::metadata(&output).unwrap().modified().unwrap(), past);
    assert!(report.timings.get_step("encode").is_some());
}

#[test]
fn test_timestamps_left_alone_when_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let input = source_file(dir.path(), "photo.heic");
    let output = dir.path().join("photo.bmp");

    let past = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
    File::options()
        .write(true)
        .open(&input)
        .unwrap()
        .set_times(FileTimes::new().set_modified(past))
        .unwrap();

    let config = ConversionConfig::builder().preserve_timestamps(false).build();
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), StandardImageWriter::new(), config);
    let report = pipeline.convert_file(&input, &output).unwrap();

    assert!(!report.timestamps_applied);
    assert_ne!(std::fs::metadata(&output).unwrap().modified().unwrap(), past);
}

#[test]
fn test_empty_and_malformed_sources_produce_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = HeicConversionPipeline::with_custom(
        HeifDecoder::new(),
        StandardImageWriter::new(),
        ConversionConfig::default(),
    );

    let empty = dir.path().join("empty.heic");
    std::fs::write(&empty, b"").unwrap();
    let malformed = source_file(dir.path(), "malformed.heif");

    for input in [empty, malformed] {
        let output = input.with_extension("bmp");
        let err = pipeline.convert_file(&input, &output).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::DecodingFailed, "{}", input.display());
        assert!(!output.exists());
    }
}

#[test]
fn test_rerun_with_overwrite_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = source_file(dir.path(), "photo.heic");
    let config = ConversionConfig::builder().overwrite(true).build();
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), StandardImageWriter::new(), config);

    for ext in ["bmp", "png", "jpg"] {
        let output = dir.path().join(format!("photo.{}", ext));
        let format = OutputFormat::from_path(&output).unwrap();
        if !pipeline.supported_output_formats().contains(&format) {
            continue;
        }
        pipeline.convert_file(&input, &output).unwrap();
        let first = std::fs::read(&output).unwrap();
        pipeline.convert_file(&input, &output).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), first, "{}", ext);
    }
}

#[test]
fn test_convert_directory() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("in");
    std::fs::create_dir_all(input_dir.join("nested")).unwrap();
    source_file(&input_dir, "a.heic");
    source_file(&input_dir, "b.HEIF");
    source_file(&input_dir, "notes.txt");
    source_file(&input_dir.join("nested"), "c.hif");
    let output_dir = dir.path().join("out");

    let config = ConversionConfig::builder().format(OutputFormat::Bmp).build();
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), MockWriter::default(), config);

    let flat = pipeline.convert_directory(&input_dir, &output_dir, false).unwrap();
    assert_eq!(flat.total(), 2);
    assert!(output_dir.join("a.bmp").exists());
    assert!(output_dir.join("b.bmp").exists());

    let config = ConversionConfig::builder()
        .format(OutputFormat::Bmp)
        .overwrite(true)
        .build();
    let pipeline = HeicConversionPipeline::with_custom(MockDecoder::new(), MockWriter::default(), config);
    let deep = pipeline.convert_directory(&input_dir, &output_dir, true).unwrap();
    assert_eq!(deep.total(), 3);
    assert!(output_dir.join("nested/c.bmp").exists());
}

#[test]
fn test_convert_directory_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    source_file(dir.path(), "a.heic");
    source_file(dir.path(), "b.heic");
    let decoder = MockDecoder {
        should_fail: true,
        ..MockDecoder::new()
    };
    let pipeline = HeicConversionPipeline::with_custom(decoder, MockWriter::default(), ConversionConfig::default());

    let err = pipeline
        .convert_directory(dir.path(), dir.path().join("out"), false)
        .unwrap_err();
    assert!(matches!(err, ConversionError::BatchProcessing { failed: 2, total: 2 }));
    assert_eq!(err.exit_code(), ExitCode::BatchProcessing);
}
