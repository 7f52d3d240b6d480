//! Source-to-destination file timestamp propagation.

use std::fs::{File, FileTimes};
use std::path::Path;
use std::time::SystemTime;

use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};

/// Snapshot of a file's timestamps, taken before the destination is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampTriple {
    /// Not every filesystem records a birth time.
    pub created: Option<SystemTime>,
    pub modified: SystemTime,
    pub accessed: SystemTime,
}

impl TimestampTriple {
    pub fn capture(path: &Path) -> Result<Self> {
        let meta = std::fs::metadata(path)
            .map_err(|e| ConversionError::TimestampCopy(format!("{}: {}", path.display(), e)))?;
        let modified = meta
            .modified()
            .map_err(|e| ConversionError::TimestampCopy(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            created: meta.created().ok(),
            modified,
            accessed: meta.accessed().unwrap_or(modified),
        })
    }

    /// Overwrites the modification and access times of `path`. The creation
    /// time is only set where the platform allows it.
    pub fn apply(&self, path: &Path) -> Result<()> {
        let file = File::options()
            .write(true)
            .open(path)
            .map_err(|e| ConversionError::TimestampCopy(format!("{}: {}", path.display(), e)))?;

        #[allow(unused_mut)]
        let mut times = FileTimes::new()
            .set_modified(self.modified)
            .set_accessed(self.accessed);
        #[cfg(windows)]
        if let Some(created) = self.created {
            use std::os::windows::fs::FileTimesExt;
            times = times.set_created(created);
        }

        file.set_times(times)
            .map_err(|e| ConversionError::TimestampCopy(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Applied source timestamps");
        Ok(())
    }
}
