use super::{FileEventHandler, FileEventSource};
use crate::error::{CctvError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileState {
    len: u64,
    modified: Option<SystemTime>,
    reported: bool,
}

/// Last observed size and mtime of every file under a root.
///
/// A file is considered closed once it is seen unchanged on two
/// consecutive polls. Files present when the snapshot is first taken form
/// the baseline and are never reported.
pub(super) struct TreeSnapshot {
    root: PathBuf,
    files: HashMap<PathBuf, FileState>,
}

impl TreeSnapshot {
    pub(super) fn baseline(root: &Path) -> Self {
        let mut snapshot = Self {
            root: root.to_path_buf(),
            files: HashMap::new(),
        };
        for (path, len, modified) in snapshot.scan() {
            snapshot.files.insert(
                path,
                FileState {
                    len,
                    modified,
                    reported: true,
                },
            );
        }
        snapshot
    }

    pub(super) fn poll(&mut self, handler: &dyn FileEventHandler) {
        let mut current = HashMap::with_capacity(self.files.len());

        for (path, len, modified) in self.scan() {
            let state = match self.files.get(&path) {
                None => {
                    handler.on_created(&path);
                    FileState {
                        len,
                        modified,
                        reported: false,
                    }
                }
                Some(prev) if prev.len == len && prev.modified == modified => {
                    if !prev.reported {
                        handler.on_closed(&path);
                    }
                    FileState {
                        reported: true,
                        ..*prev
                    }
                }
                Some(_) => FileState {
                    len,
                    modified,
                    reported: false,
                },
            };
            current.insert(path, state);
        }

        self.files = current;
    }

    fn scan(&self) -> Vec<(PathBuf, u64, Option<SystemTime>)> {
        WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Poll skipped entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                Some((
                    entry.into_path(),
                    metadata.len(),
                    metadata.modified().ok(),
                ))
            })
            .collect()
    }
}

/// Portable fallback that rescans the tree on a fixed interval
pub struct PollingEventSource {
    interval: Duration,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PollingEventSource {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stop_tx: None,
            handle: None,
        }
    }
}

impl FileEventSource for PollingEventSource {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn start(&mut self, root: &Path, handler: Arc<dyn FileEventHandler>) -> Result<()> {
        if self.handle.is_some() {
            return Err(CctvError::component("watcher", "poller already started"));
        }

        let mut snapshot = TreeSnapshot::baseline(root);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = self.interval;

        let handle = thread::Builder::new()
            .name("cctv-poller".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => snapshot.poll(handler.as_ref()),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| CctvError::component("watcher", format!("Failed to spawn poller: {}", e)))?;

        info!(
            "Polling {} every {}ms for new videos",
            root.display(),
            interval.as_millis()
        );
        self.stop_tx = Some(stop_tx);
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Poller thread panicked");
                return Err(CctvError::component("watcher", "poller thread panicked"));
            }
            info!("Poller stopped");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for PollingEventSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
