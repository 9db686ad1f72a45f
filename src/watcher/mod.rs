//! Filesystem event sources feeding the ingestion queue.

mod native;
mod polling;


pub use native::NativeEventSource;
pub use polling::PollingEventSource;

use crate::config::{WatchMode, WatcherConfig};
use crate::error::{CctvError, Result};
use crate::filename::VideoPath;
use crate::queue::IngestionQueue;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Receives notifications for files under a watched tree
pub trait FileEventHandler: Send + Sync {
    /// A file appeared; it may still be being written
    fn on_created(&self, path: &Path);

    /// A writer closed the file; it is safe to read
    fn on_closed(&self, path: &Path);
}

/// A subscription to file events under a directory tree
pub trait FileEventSource: Send {
    fn name(&self) -> &'static str;

    /// Begin delivering events for `root`, recursively
    fn start(&mut self, root: &Path, handler: Arc<dyn FileEventHandler>) -> Result<()>;

    /// Stop delivering events and release the subscription
    fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;
}

/// Build the event source selected by configuration
pub fn create_event_source(config: &WatcherConfig) -> Box<dyn FileEventSource> {
    match config.resolved_mode() {
        WatchMode::Polling => Box::new(PollingEventSource::new(config.poll_interval())),
        WatchMode::Native | WatchMode::Auto => Box::new(NativeEventSource::new()),
    }
}

/// Enqueues closed video files; creation is only logged
pub struct QueueingHandler {
    queue: Arc<IngestionQueue>,
    extension: String,
}

impl QueueingHandler {
    pub fn new<S: Into<String>>(queue: Arc<IngestionQueue>, extension: S) -> Self {
        Self {
            queue,
            extension: extension.into(),
        }
    }

    fn video_path(&self, path: &Path) -> Option<VideoPath> {
        VideoPath::from_path(path).filter(|v| v.has_extension(&self.extension))
    }
}

impl FileEventHandler for QueueingHandler {
    fn on_created(&self, path: &Path) {
        if self.video_path(path).is_some() {
            debug!("VIDEO CREATED {}", path.display());
        }
    }

    fn on_closed(&self, path: &Path) {
        if let Some(video) = self.video_path(path) {
            debug!("VIDEO CLOSED {}", path.display());
            self.queue.enqueue(video);
        }
    }
}

/// Every video file under `root`, in sorted depth-first order
pub fn scan_tree(root: &Path, extension: &str) -> Result<Vec<VideoPath>> {
    if !root.is_dir() {
        return Err(CctvError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("incoming directory {} does not exist", root.display()),
        )));
    }

    let mut videos = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry during scan: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(video) = VideoPath::from_path(entry.path()) {
            if video.has_extension(extension) {
                videos.push(video);
            }
        }
    }
    Ok(videos)
}
