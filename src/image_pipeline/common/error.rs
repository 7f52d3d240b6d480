use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Failed to read input file: {0}")]
    ReadPermission(String),

    #[error("Failed to write output file: {0}")]
    WritePermission(String),

    #[error("Output file already exists: {}", .0.display())]
    OutputExists(PathBuf),

    #[error("Failed to decode HEIF image: {0}")]
    DecodingFailed(String),

    #[error("Failed to encode image: {0}")]
    EncodingFailed(String),

    #[error("Invalid image buffer: {0}")]
    InvalidInput(String),

    #[error("{format} does not support {channels}-channel images")]
    UnsupportedChannels { format: &'static str, channels: u8 },

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(u32, u32),

    #[error("Memory allocation failed: {0}")]
    MemoryAllocation(String),

    #[error("Codec not available: {0}")]
    CodecInitialization(String),

    #[error("{failed} of {total} files failed to convert")]
    BatchProcessing { failed: usize, total: usize },

    #[error("Failed to extract metadata: {0}")]
    MetadataExtraction(String),

    #[error("Failed to write metadata: {0}")]
    MetadataWriting(String),

    #[error("Failed to copy timestamps: {0}")]
    TimestampCopy(String),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ConversionError>;

/// Process exit codes reported by the command line front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    InvalidArguments = 1,
    UnsupportedFormat = 2,
    FileNotFound = 3,
    ReadPermission = 4,
    WritePermission = 5,
    DecodingFailed = 6,
    EncodingFailed = 7,
    MemoryAllocation = 8,
    CodecInitialization = 9,
    BatchProcessing = 10,
    MetadataExtraction = 11,
    MetadataWriting = 12,
    TimestampCopy = 13,
    Unknown = 255,
}

impl ExitCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl ConversionError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidArguments(_) => ExitCode::InvalidArguments,
            Self::UnsupportedFormat(_) => ExitCode::UnsupportedFormat,
            Self::FileNotFound(_) => ExitCode::FileNotFound,
            Self::ReadPermission(_) => ExitCode::ReadPermission,
            Self::WritePermission(_) | Self::OutputExists(_) => ExitCode::WritePermission,
            Self::DecodingFailed(_) | Self::InvalidDimensions(..) => ExitCode::DecodingFailed,
            Self::EncodingFailed(_) | Self::InvalidInput(_) | Self::UnsupportedChannels { .. } => {
                ExitCode::EncodingFailed
            }
            Self::MemoryAllocation(_) => ExitCode::MemoryAllocation,
            Self::CodecInitialization(_) => ExitCode::CodecInitialization,
            Self::BatchProcessing { .. } => ExitCode::BatchProcessing,
            Self::MetadataExtraction(_) => ExitCode::MetadataExtraction,
            Self::MetadataWriting(_) => ExitCode::MetadataWriting,
            Self::TimestampCopy(_) => ExitCode::TimestampCopy,
            Self::IoError(e) => match e.kind() {
                io::ErrorKind::NotFound => ExitCode::FileNotFound,
                io::ErrorKind::PermissionDenied => ExitCode::WritePermission,
                io::ErrorKind::OutOfMemory => ExitCode::MemoryAllocation,
                _ => ExitCode::Unknown,
            },
        }
    }

    /// Metadata and timestamp failures never abort a conversion whose pixels
    /// were already written.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::MetadataExtraction(_) | Self::MetadataWriting(_) | Self::TimestampCopy(_)
        )
    }
}
