use super::{FileEventHandler, FileEventSource};
use crate::error::{CctvError, Result};
use notify::event::{AccessKind, AccessMode, CreateKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Platform notification backend (inotify on Linux).
///
/// Close events are only reported by inotify; other platforms should use
/// the polling source.
pub struct NativeEventSource {
    watcher: Option<RecommendedWatcher>,
}

impl NativeEventSource {
    pub fn new() -> Self {
        Self { watcher: None }
    }
}

impl Default for NativeEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FileEventSource for NativeEventSource {
    fn name(&self) -> &'static str {
        "native"
    }

    fn start(&mut self, root: &Path, handler: Arc<dyn FileEventHandler>) -> Result<()> {
        if self.watcher.is_some() {
            return Err(CctvError::component("watcher", "native watcher already started"));
        }

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => dispatch(handler.as_ref(), &event),
            Err(e) => error!("Watch error: {}", e),
        })
        .map_err(|e| CctvError::component("watcher", format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| {
                CctvError::component(
                    "watcher",
                    format!("Failed to watch {}: {}", root.display(), e),
                )
            })?;

        info!("Watching {} for new videos", root.display());
        self.watcher = Some(watcher);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(watcher) = self.watcher.take() {
            drop(watcher);
            info!("Native watcher stopped");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

pub(super) fn dispatch(handler: &dyn FileEventHandler, event: &Event) {
    match event.kind {
        EventKind::Create(CreateKind::File) | EventKind::Create(CreateKind::Any) => {
            for path in &event.paths {
                handler.on_created(path);
            }
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            for path in &event.paths {
                handler.on_closed(path);
            }
        }
        _ => {}
    }
}
