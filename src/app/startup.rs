use super::consumer::spawn_consumer;
use super::orchestrator::{CONSUMER, WATCHER};
use super::{CctvOrchestrator, ComponentState};
use crate::error::{CctvError, Result};
use crate::watcher::{scan_tree, FileEventHandler, QueueingHandler};
use std::fs;
use std::sync::Arc;
use tracing::{error, info};

impl CctvOrchestrator {
    /// Check the incoming tree and create the output directories
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing CCTV filter");

        let paths = &self.config.paths;
        if !paths.incoming.is_dir() {
            return Err(CctvError::config(format!(
                "Incoming directory {} does not exist",
                paths.incoming.display()
            )));
        }

        for dir in paths.output_dirs() {
            fs::create_dir_all(&dir).map_err(|e| {
                CctvError::config(format!("Cannot create directory {}: {}", dir.display(), e))
            })?;
        }

        let mut states = self.component_states.lock().await;
        states.insert(WATCHER.to_string(), ComponentState::Stopped);
        states.insert(CONSUMER.to_string(), ComponentState::Stopped);
        drop(states);

        info!("Directories ready");
        Ok(())
    }

    /// Subscribe to file events, queue the backlog and start consuming.
    ///
    /// The subscription comes first so nothing closed during the scan is
    /// missed; the queue drops the resulting duplicates.
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting CCTV filter");

        self.set_component_state(WATCHER, ComponentState::Starting)
            .await;
        let handler: Arc<dyn FileEventHandler> = Arc::new(QueueingHandler::new(
            Arc::clone(&self.queue),
            self.config.watcher.video_extension.clone(),
        ));
        let incoming = self.config.paths.incoming.clone();
        let started = match self.event_source.as_mut() {
            Some(source) => source.start(&incoming, handler),
            None => Err(CctvError::component(WATCHER, "event source already released")),
        };
        if let Err(e) = started {
            error!("Failed to start watcher: {}", e);
            self.set_component_state(WATCHER, ComponentState::Failed)
                .await;
            return Err(e);
        }
        self.set_component_state(WATCHER, ComponentState::Running)
            .await;

        self.enqueue_backlog()?;
        self.start_consumer().await?;

        info!("CCTV filter started successfully");
        Ok(())
    }

    /// Queue every video already in the incoming tree; returns how many were new
    pub fn enqueue_backlog(&self) -> Result<usize> {
        let videos = scan_tree(
            &self.config.paths.incoming,
            &self.config.watcher.video_extension,
        )?;
        let found = videos.len();
        let queued = videos
            .into_iter()
            .filter(|video| self.queue.enqueue(video.clone()))
            .count();
        info!("Backlog scan found {} videos, {} queued", found, queued);
        Ok(queued)
    }

    pub(super) async fn start_consumer(&mut self) -> Result<()> {
        self.set_component_state(CONSUMER, ComponentState::Starting)
            .await;
        let handle = spawn_consumer(
            Arc::clone(&self.queue),
            Arc::clone(&self.processor),
            self.cancellation_token.clone(),
            self.config.watcher.idle_wait(),
        )
        .map_err(|e| {
            CctvError::component(CONSUMER, format!("Failed to spawn consumer thread: {}", e))
        })?;
        self.consumer = Some(handle);
        self.set_component_state(CONSUMER, ComponentState::Running)
            .await;
        Ok(())
    }
}
