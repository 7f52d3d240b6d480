use std::path::{Path, PathBuf};
use std::process::ExitCode as ProcessExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use tracing::{error, info};

use heic_raster::image_pipeline::{
    ConversionConfig, ConversionError, ExitCode, HeicConversionPipeline, OutputFormat,
};
use heic_raster::logger;

#[derive(Parser, Debug)]
#[command(
    name = "heic-raster",
    version,
    about = "Convert HEIC/HEIF images to JPEG, PNG, BMP, TIFF or WebP, keeping metadata and timestamps"
)]
struct Cli {
    /// Source image, or a directory of images
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Destination file or directory (default: next to the input)
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Output format: jpg, jpeg, png, bmp, tif, tiff, webp
    #[arg(short, long)]
    format: Option<String>,

    /// JPEG/WebP quality
    #[arg(short, long, default_value_t = 85, value_parser = clap::value_parser!(i32).range(1..=100))]
    quality: i32,

    /// PNG/TIFF compression level
    #[arg(short, long, default_value_t = 6, value_parser = clap::value_parser!(i32).range(0..=9))]
    compression: i32,

    /// Scale factor (accepted, not yet applied)
    #[arg(short, long, default_value_t = 1.0, value_parser = parse_scale)]
    scale: f32,

    /// Descend into subdirectories when INPUT is a directory
    #[arg(short, long)]
    recursive: bool,

    /// Replace existing output files
    #[arg(short, long)]
    overwrite: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    progressive: bool,

    #[arg(long)]
    interlace: bool,

    /// Lossless WebP
    #[arg(long)]
    lossless: bool,

    /// Drop all metadata
    #[arg(long)]
    no_metadata: bool,

    /// Do not copy source file timestamps
    #[arg(long)]
    no_timestamps: bool,

    #[arg(long)]
    no_exif: bool,

    #[arg(long)]
    no_xmp: bool,

    #[arg(long)]
    no_iptc: bool,

    /// Drop GPS data (removes the whole EXIF block)
    #[arg(long)]
    no_gps: bool,
}

fn parse_scale(value: &str) -> std::result::Result<f32, String> {
    let scale: f32 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if (0.1..=10.0).contains(&scale) {
        Ok(scale)
    } else {
        Err(format!("scale must be between 0.1 and 10.0, got {}", scale))
    }
}

impl Cli {
    fn config(&self) -> std::result::Result<ConversionConfig, ConversionError> {
        let mut builder = ConversionConfig::builder()
            .quality(self.quality)
            .compression_level(self.compression)
            .scale(self.scale)
            .progressive(self.progressive)
            .interlace(self.interlace)
            .lossless(self.lossless)
            .overwrite(self.overwrite)
            .keep_metadata(!self.no_metadata)
            .preserve_timestamps(!self.no_timestamps)
            .preserve_exif(!self.no_exif)
            .preserve_xmp(!self.no_xmp)
            .preserve_iptc(!self.no_iptc)
            .preserve_gps(!self.no_gps);
        if let Some(format) = &self.format {
            builder = builder.format(format.parse()?);
        }
        Ok(builder.build())
    }
}

fn default_output(input: &Path, format: Option<OutputFormat>) -> PathBuf {
    input.with_extension(format.unwrap_or(OutputFormat::Jpeg).extension())
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.config()?;
    let pipeline = HeicConversionPipeline::new(config.clone());

    let formats: Vec<_> = pipeline
        .supported_output_formats()
        .iter()
        .map(|f| f.name())
        .collect();
    info!("Available output formats: {}", formats.join(", "));

    if cli.input.is_dir() {
        let output_dir = cli.output.clone().unwrap_or_else(|| cli.input.clone());
        let report = pipeline
            .convert_directory(&cli.input, &output_dir, cli.recursive)
            .with_context(|| format!("converting directory {}", cli.input.display()))?;
        info!("Converted {} files", report.total());
    } else {
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| default_output(&cli.input, config.format));
        pipeline
            .convert_file(&cli.input, &output)
            .with_context(|| format!("converting {}", cli.input.display()))?;
    }
    Ok(())
}

fn main() -> ProcessExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ProcessExitCode::SUCCESS,
                _ => ProcessExitCode::from(ExitCode::InvalidArguments.code()),
            };
        }
    };

    logger::init_with_verbosity(cli.verbose);

    match run(&cli) {
        Ok(()) => ProcessExitCode::SUCCESS,
        Err(e) => {
            let code = e
                .downcast_ref::<ConversionError>()
                .map(ConversionError::exit_code)
                .unwrap_or(ExitCode::Unknown);
            error!("{:#}", e);
            ProcessExitCode::from(code.code())
        }
    }
}
