use super::types::{ComponentState, ShutdownReason};
use crate::config::CctvConfig;
use crate::detection::DetectionClient;
use crate::error::Result;
use crate::pipeline::{PipelineStats, PipelineStatsSnapshot, VideoProcessor};
use crate::queue::IngestionQueue;
use crate::sampler::{default_opener, VideoOpener};
use crate::watcher::{create_event_source, FileEventSource};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(super) const WATCHER: &str = "watcher";
pub(super) const CONSUMER: &str = "consumer";

/// Owns the queue, the event source and the consumer thread for one deployment
pub struct CctvOrchestrator {
    pub(super) config: CctvConfig,
    pub(super) queue: Arc<IngestionQueue>,
    pub(super) processor: Arc<VideoProcessor>,
    pub(super) stats: Arc<PipelineStats>,

    // Components
    pub(super) event_source: Option<Box<dyn FileEventSource>>,
    pub(super) consumer: Option<JoinHandle<()>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl CctvOrchestrator {
    /// Assemble an orchestrator from explicit collaborators
    pub fn new(
        config: CctvConfig,
        classifier: Arc<dyn DetectionClient>,
        opener: Arc<dyn VideoOpener>,
        event_source: Box<dyn FileEventSource>,
    ) -> Result<Self> {
        let processor = VideoProcessor::from_config(&config, classifier, opener)?;
        let stats = processor.stats();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            queue: Arc::new(IngestionQueue::new()),
            processor: Arc::new(processor),
            stats,
            event_source: Some(event_source),
            consumer: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Build the production stack: DeepStack classifier, ffmpeg decoder and the configured watcher.
    ///
    /// The classifier client is blocking, so call this outside async code
    /// (for example through `spawn_blocking`).
    pub fn from_config(config: CctvConfig) -> Result<Self> {
        let classifier = build_classifier(&config)?;
        let opener = default_opener()?;
        let event_source = create_event_source(&config.watcher);
        debug!("Using {} file event source", event_source.name());
        Self::new(config, classifier, opener, event_source)
    }

    pub fn config(&self) -> &CctvConfig {
        &self.config
    }

    pub fn queue(&self) -> Arc<IngestionQueue> {
        Arc::clone(&self.queue)
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Update component state
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        debug!("Component '{}' state changed to: {:?}", component, state);
        self.component_states
            .lock()
            .await
            .insert(component.to_string(), state);
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        self.component_states.lock().await.clone()
    }
}

#[cfg(feature = "deepstack")]
fn build_classifier(config: &CctvConfig) -> Result<Arc<dyn DetectionClient>> {
    use crate::detection::DeepStackClient;
    use tracing::info;

    let client = DeepStackClient::new(&config.classifier.url, config.classifier.timeout())
        .map_err(|e| crate::error::CctvError::config(e.to_string()))?;
    info!("Classifier endpoint: {}", client.endpoint());
    Ok(Arc::new(client))
}

#[cfg(not(feature = "deepstack"))]
fn build_classifier(_config: &CctvConfig) -> Result<Arc<dyn DetectionClient>> {
    Err(crate::error::CctvError::config(
        "built without a classifier client; enable the `deepstack` feature",
    ))
}
