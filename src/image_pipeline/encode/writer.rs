use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use tempfile::Builder;
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::encode::types::{EncodeOptions, OutputFormat};
use crate::image_pipeline::metadata::types::EmbedReport;
use crate::image_pipeline::source::types::RawImageBuffer;

fn write_error(path: &Path, e: std::io::Error) -> ConversionError {
    match e.kind() {
        ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => {
            ConversionError::WritePermission(format!("{}: {}", path.display(), e))
        }
        _ => ConversionError::IoError(e),
    }
}

/// Temp files are created 0666 before the umask, like a plain `File::create`,
/// instead of tempfile's owner-only default.
fn temp_builder<'a, 'b>() -> Builder<'a, 'b> {
    #[allow(unused_mut)]
    let mut builder = Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder
}

pub trait ImageWriter {
    /// Encodes `image` into `output`, re-embedding whatever metadata the
    /// target format can carry. Metadata that cannot be written is listed in
    /// the returned report and never fails the encode.
    fn write_image(
        &self,
        image: &RawImageBuffer,
        output: &mut dyn Write,
        options: &EncodeOptions,
    ) -> Result<EmbedReport>;

    fn supported_formats(&self) -> Vec<OutputFormat>;

    /// Encodes to a temp file next to `destination` and renames it into
    /// place after a clean flush. On any error the temp file is removed and
    /// `destination` is left untouched. A replaced destination keeps its
    /// permissions.
    fn write_file(
        &self,
        image: &RawImageBuffer,
        destination: &Path,
        options: &EncodeOptions,
    ) -> Result<EmbedReport> {
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| write_error(dir, e))?;

        let previous = std::fs::metadata(destination).ok().map(|m| m.permissions());
        let mut temp = temp_builder()
            .tempfile_in(dir)
            .map_err(|e| write_error(dir, e))?;
        debug!(temp = %temp.path().display(), "Encoding to temporary file");

        let report = {
            let mut out = BufWriter::new(temp.as_file_mut());
            let report = self.write_image(image, &mut out, options)?;
            out.flush().map_err(|e| write_error(destination, e))?;
            report
        };
        temp.as_file()
            .sync_all()
            .map_err(|e| write_error(destination, e))?;

        if let Some(permissions) = previous {
            temp.as_file()
                .set_permissions(permissions)
                .map_err(|e| write_error(destination, e))?;
        }

        temp.persist(destination)
            .map_err(|e| write_error(destination, e.error))?;
        Ok(report)
    }
}
