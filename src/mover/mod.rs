//! Terminal filesystem transitions for processed videos.

mod snapshot;

pub use snapshot::{SnapshotReport, SnapshotWriter};

use crate::error::FilesystemError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Moves videos into their terminal directory with a single rename.
///
/// Source and target must live on the same volume; a rename either fully
/// happens or leaves the source untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mover;

impl Mover {
    pub fn new() -> Self {
        Self
    }

    /// Rename `video` to `target_dir/target_name`, refusing to overwrite
    pub fn relocate(
        &self,
        video: &Path,
        target_dir: &Path,
        target_name: &str,
    ) -> Result<PathBuf, FilesystemError> {
        if !video.exists() {
            return Err(FilesystemError::SourceMissing {
                path: video.to_path_buf(),
            });
        }

        let target = target_dir.join(target_name);
        if target.exists() {
            return Err(FilesystemError::TargetExists { path: target });
        }

        fs::rename(video, &target).map_err(|source| FilesystemError::Rename {
            from: video.to_path_buf(),
            to: target.clone(),
            source,
        })?;

        debug!("Renamed {} to {}", video.display(), target.display());
        Ok(target)
    }
}

impl FilesystemError {
    /// Rename failures may be transient (locks, network shares); the rest are not
    pub fn is_retryable(&self) -> bool {
        matches!(self, FilesystemError::Rename { .. })
    }
}
