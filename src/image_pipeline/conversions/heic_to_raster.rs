use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::common::timing::{PipelineTimings, Timer};
use crate::image_pipeline::conversions::timestamps::TimestampTriple;
use crate::image_pipeline::conversions::types::{BatchReport, ConversionConfig, ConversionReport};
use crate::image_pipeline::encode::{ImageWriter, OutputFormat, StandardImageWriter};
use crate::image_pipeline::metadata::types::{EmbedReport, MetadataBundle};
use crate::image_pipeline::source::container;
use crate::image_pipeline::source::{HeifDecoder, RawImageBuffer, SourceDecoder};

/// Decode, metadata, encode and timestamp steps for HEIC/HEIF sources.
pub struct HeicConversionPipeline<D: SourceDecoder, W: ImageWriter> {
    decoder: D,
    writer: W,
    config: ConversionConfig,
}

impl HeicConversionPipeline<HeifDecoder, StandardImageWriter> {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            decoder: HeifDecoder::with_max_dimension(
                config.max_dimension.filter(|_| config.validate_dimensions),
            ),
            writer: StandardImageWriter::new(),
            config,
        }
    }
}

impl<D: SourceDecoder, W: ImageWriter> HeicConversionPipeline<D, W> {
    pub fn with_custom(decoder: D, writer: W, config: ConversionConfig) -> Self {
        Self {
            decoder,
            writer,
            config,
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ConversionConfig) {
        self.config = config;
    }

    pub fn supported_output_formats(&self) -> Vec<OutputFormat> {
        self.writer.supported_formats()
    }

    fn validate_dimensions(&self, width: u32, height: u32) -> Result<()> {
        if !self.config.validate_dimensions {
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(ConversionError::InvalidDimensions(width, height));
        }

        if let Some(max) = self.config.max_dimension {
            if width > max || height > max {
                return Err(ConversionError::InvalidDimensions(width, height));
            }
        }

        Ok(())
    }

    /// Applies the metadata policy, logging what it removes.
    fn select_metadata(&self, bundle: &MetadataBundle) -> MetadataBundle {
        let policy = &self.config.metadata;
        if bundle.exif().is_some() && policy.exif_dropped_for_gps() {
            info!("GPS preservation is off; dropping the whole EXIF block");
        }
        let selected = bundle.filtered(policy);
        for kind in bundle.kinds().filter(|k| !selected.contains(*k)) {
            debug!(%kind, "Metadata block excluded by policy");
        }
        selected
    }

    /// JPEG has no alpha, so alpha is composited onto white first.
    fn prepare_for_format<'a>(
        &self,
        image: &'a RawImageBuffer,
        format: OutputFormat,
    ) -> Result<std::borrow::Cow<'a, RawImageBuffer>> {
        if format == OutputFormat::Jpeg && image.has_alpha() {
            debug!(channels = image.channels(), "Flattening alpha for JPEG");
            return Ok(std::borrow::Cow::Owned(image.flatten_alpha()?));
        }
        Ok(std::borrow::Cow::Borrowed(image))
    }

    /// In-memory conversion. Metadata is always queried here; the caller
    /// decides the target format.
    #[instrument(skip(self, input_data, output), fields(input_size = input_data.len()))]
    pub fn convert(
        &self,
        input_data: &[u8],
        format: OutputFormat,
        output: &mut dyn Write,
    ) -> Result<EmbedReport> {
        info!("Starting HEIC to {} conversion", format);

        let image = {
            let _span = tracing::info_span!("decode").entered();
            self.decoder.decode(input_data)?
        };

        {
            let _span = tracing::info_span!(
                "validate_dimensions",
                width = image.width(),
                height = image.height()
            )
            .entered();
            self.validate_dimensions(image.width(), image.height())?;
        }

        let metadata = {
            let _span = tracing::info_span!("extract_metadata").entered();
            if self.config.metadata.keep_metadata {
                match self.decoder.extract_metadata(input_data) {
                    Ok(bundle) => self.select_metadata(&bundle),
                    Err(e) => {
                        warn!("Continuing without metadata: {}", e);
                        MetadataBundle::new()
                    }
                }
            } else {
                MetadataBundle::new()
            }
        };

        let report = {
            let _span = tracing::info_span!("encode", %format).entered();
            let prepared = self.prepare_for_format(&image, format)?;
            let options = self.config.encode_options(format, metadata);
            self.writer.write_image(&prepared, output, &options)?
        };

        info!(
            width = image.width(),
            height = image.height(),
            "Conversion complete"
        );
        Ok(report)
    }

    /// Converts one file. Metadata and timestamp failures are downgraded to
    /// warnings in the report; every other failure is returned after being
    /// logged, and never leaves a partial destination file.
    #[instrument(skip(self, input_path, output_path))]
    pub fn convert_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
    ) -> Result<ConversionReport> {
        let input_path = input_path.as_ref();
        let output_path = output_path.as_ref();

        info!(
            input = %input_path.display(),
            output = %output_path.display(),
            "Converting file"
        );

        let result = self.run_file(input_path, output_path);
        match &result {
            Ok(report) => {
                report.timings.log_summary();
                info!(
                    outcome = "success",
                    output = %report.output.display(),
                    width = report.width,
                    height = report.height,
                    "Converted {} to {}",
                    input_path.display(),
                    report.format
                );
            }
            Err(e) => error!(
                input = %input_path.display(),
                exit_code = e.exit_code().code(),
                "Conversion failed: {}",
                e
            ),
        }
        result
    }

    fn validate_destination(&self, output_path: &Path) -> Result<()> {
        if output_path.is_dir() {
            return Err(ConversionError::InvalidArguments(format!(
                "{} is a directory",
                output_path.display()
            )));
        }
        if output_path.exists() && !self.config.overwrite {
            return Err(ConversionError::OutputExists(output_path.to_path_buf()));
        }
        match output_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                std::fs::create_dir_all(dir).map_err(|e| {
                    ConversionError::WritePermission(format!("{}: {}", dir.display(), e))
                })
            }
            _ => Ok(()),
        }
    }

    fn run_file(&self, input_path: &Path, output_path: &Path) -> Result<ConversionReport> {
        let mut timings = PipelineTimings::new();
        let mut warnings = Vec::new();
        let format = OutputFormat::resolve(self.config.format, output_path);

        {
            let _span = tracing::info_span!("validate").entered();
            let timer = Timer::start("validate");
            container::validate_input_path(input_path)?;
            self.validate_destination(output_path)?;
            timings.record(timer);
        }

        let timestamps = {
            let _span = tracing::info_span!("capture_timestamps").entered();
            let timer = Timer::start("capture_timestamps");
            let captured = TimestampTriple::capture(input_path);
            timings.record(timer);
            captured
        };

        let input_data = {
            let _span = tracing::info_span!("read_input").entered();
            let timer = Timer::start("read_input");
            let data = std::fs::read(input_path).map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    ConversionError::ReadPermission(format!("{}: {}", input_path.display(), e))
                }
                _ => ConversionError::IoError(e),
            })?;
            timings.record(timer);
            data
        };

        let image = {
            let _span = tracing::info_span!("decode").entered();
            let timer = Timer::start("decode");
            let image = self.decoder.decode(&input_data)?;
            self.validate_dimensions(image.width(), image.height())?;
            timings.record(timer);
            image
        };
        if image.is_panorama() {
            debug!(
                width = image.width(),
                height = image.height(),
                "Source looks like a panorama"
            );
        }

        let metadata = {
            let _span = tracing::info_span!("extract_metadata").entered();
            let timer = Timer::start("extract_metadata");
            let bundle = if !self.config.metadata.keep_metadata {
                MetadataBundle::new()
            } else if !container::carries_metadata(input_path) {
                debug!("Source format carries no queryable metadata");
                MetadataBundle::new()
            } else {
                match self.decoder.extract_metadata(&input_data) {
                    Ok(bundle) => self.select_metadata(&bundle),
                    Err(e) => {
                        warn!("Continuing without metadata: {}", e);
                        warnings.push(e.to_string());
                        MetadataBundle::new()
                    }
                }
            };
            timings.record(timer);
            bundle
        };
        drop(input_data);

        let embed = {
            let _span = tracing::info_span!("encode", %format).entered();
            let timer = Timer::start("encode");
            let prepared = self.prepare_for_format(&image, format)?;
            let options = self.config.encode_options(format, metadata);
            let embed = self.writer.write_file(&prepared, output_path, &options)?;
            timings.record(timer);
            embed
        };
        warnings.extend(
            embed
                .skipped
                .iter()
                .map(|(kind, reason)| format!("{} not written: {}", kind, reason)),
        );

        let timestamps_applied = {
            let _span = tracing::info_span!("apply_timestamps").entered();
            let timer = Timer::start("apply_timestamps");
            let applied = if !self.config.preserve_timestamps {
                false
            } else {
                match timestamps.and_then(|t| t.apply(output_path)) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Timestamps not preserved: {}", e);
                        warnings.push(e.to_string());
                        false
                    }
                }
            };
            timings.record(timer);
            applied
        };

        Ok(ConversionReport {
            input: input_path.to_path_buf(),
            output: output_path.to_path_buf(),
            format,
            width: image.width(),
            height: image.height(),
            channels: image.channels(),
            metadata: embed,
            timestamps_applied,
            warnings,
            timings,
        })
    }

    /// Destination for `input` below `output_dir`, keeping its position
    /// relative to `input_dir`.
    pub fn batch_destination(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        input: &Path,
    ) -> PathBuf {
        let format = self.config.format.unwrap_or(OutputFormat::Jpeg);
        let relative = input.strip_prefix(input_dir).unwrap_or(input);
        output_dir.join(relative).with_extension(format.extension())
    }

    /// Converts every supported file in `input_dir`, one at a time. Fails
    /// with BatchProcessing if any single file failed.
    #[instrument(skip(self, input_dir, output_dir))]
    pub fn convert_directory<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Q,
        recursive: bool,
    ) -> Result<BatchReport> {
        let input_dir = input_dir.as_ref();
        let output_dir = output_dir.as_ref();
        if !input_dir.exists() {
            return Err(ConversionError::FileNotFound(input_dir.to_path_buf()));
        }
        if !input_dir.is_dir() {
            return Err(ConversionError::InvalidArguments(format!(
                "{} is not a directory",
                input_dir.display()
            )));
        }

        let walker = WalkDir::new(input_dir)
            .max_depth(if recursive { usize::MAX } else { 1 })
            .sort_by_file_name();

        let mut report = BatchReport::default();
        let mut failed = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    failed += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() || !container::has_supported_extension(entry.path()) {
                continue;
            }

            let destination = self.batch_destination(input_dir, output_dir, entry.path());
            match self.convert_file(entry.path(), &destination) {
                Ok(converted) => report.converted.push(converted),
                Err(_) => failed += 1,
            }
        }

        let total = report.total() + failed;
        if total == 0 {
            warn!(dir = %input_dir.display(), "No supported images found");
        }
        info!(converted = report.total(), failed, total, "Directory conversion finished");

        if failed > 0 {
            return Err(ConversionError::BatchProcessing { failed, total });
        }
        Ok(report)
    }
}
