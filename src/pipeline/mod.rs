//! Per-video processing: parse, look up, decide, then move and archive.

mod stats;

#[cfg(test)]
mod tests;

pub use stats::{PipelineStats, PipelineStatsSnapshot};

use crate::admission::{AdmissionDecider, Verdict};
use crate::camera::{Camera, CameraRegistry};
use crate::config::{CctvConfig, PathsConfig};
use crate::detection::DetectionClient;
use crate::error::{CctvError, FilesystemError, Result};
use crate::filename::{snapshot_name, VideoIdentity};
use crate::mover::{Mover, SnapshotWriter};
use crate::queue::QueueEntry;
use crate::recovery::RetryPolicy;
use crate::sampler::VideoOpener;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Terminal directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub accepted: PathBuf,
    pub rejected: PathBuf,
    pub latest_detection: PathBuf,
    pub dead_letter: PathBuf,
}

impl OutputPaths {
    pub fn from_config(paths: &PathsConfig) -> Self {
        Self {
            accepted: paths.accepted.clone(),
            rejected: paths.rejected.clone(),
            latest_detection: paths.latest_detection.clone(),
            dead_letter: paths.dead_letter_dir(),
        }
    }
}

/// Where a video ended up
#[derive(Debug)]
pub enum ProcessOutcome {
    Accepted {
        target: PathBuf,
        snapshots_written: usize,
        snapshots_failed: usize,
    },
    Rejected {
        target: PathBuf,
    },
    /// Unparseable name or unknown camera, moved under its original name
    ErrorRouted {
        target: PathBuf,
        reason: String,
    },
    DeadLettered {
        target: PathBuf,
        reason: String,
    },
    /// Every move failed; the file is still in the incoming tree
    Stranded {
        reason: String,
    },
    /// The file was no longer in the incoming tree to be routed
    Vanished,
}

impl ProcessOutcome {
    pub fn target(&self) -> Option<&Path> {
        match self {
            ProcessOutcome::Accepted { target, .. }
            | ProcessOutcome::Rejected { target }
            | ProcessOutcome::ErrorRouted { target, .. }
            | ProcessOutcome::DeadLettered { target, .. } => Some(target),
            ProcessOutcome::Stranded { .. } | ProcessOutcome::Vanished => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ProcessOutcome::Accepted { .. })
    }
}

/// Runs one queue entry through to its terminal state.
///
/// Never fails: every error is turned into a routing decision so the
/// consumer loop keeps going.
pub struct VideoProcessor {
    registry: CameraRegistry,
    decider: AdmissionDecider,
    classifier: Arc<dyn DetectionClient>,
    mover: Mover,
    snapshots: SnapshotWriter,
    outputs: OutputPaths,
    move_retry: RetryPolicy,
    stats: Arc<PipelineStats>,
}

impl VideoProcessor {
    pub fn new(
        registry: CameraRegistry,
        decider: AdmissionDecider,
        classifier: Arc<dyn DetectionClient>,
        snapshots: SnapshotWriter,
        outputs: OutputPaths,
        move_retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            decider,
            classifier,
            mover: Mover::new(),
            snapshots,
            outputs,
            move_retry,
            stats: Arc::new(PipelineStats::new()),
        }
    }

    pub fn from_config(
        config: &CctvConfig,
        classifier: Arc<dyn DetectionClient>,
        opener: Arc<dyn VideoOpener>,
    ) -> Result<Self> {
        let registry = CameraRegistry::new(config.cameras.clone())?;
        let decider = AdmissionDecider::new(
            config.detection.accepted_labels.iter().cloned(),
            config.detection.frame_stride,
            config.retry.clone(),
            opener,
        );
        Ok(Self::new(
            registry,
            decider,
            classifier,
            SnapshotWriter::new(config.detection.annotate_snapshots, config.detection.draw_roi),
            OutputPaths::from_config(&config.paths),
            config.retry.clone(),
        ))
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn outputs(&self) -> &OutputPaths {
        &self.outputs
    }

    /// Route one entry. A panic while handling it dead-letters the video
    /// and leaves the processor usable for the next entry.
    pub fn process(&self, entry: &QueueEntry) -> ProcessOutcome {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.route(entry))) {
            Ok(outcome) => outcome,
            Err(payload) => self.route_panic(entry, panic_message(payload.as_ref())),
        };
        self.stats.record(&outcome);
        outcome
    }

    fn route_panic(&self, entry: &QueueEntry, message: String) -> ProcessOutcome {
        let source = entry.full_path();
        let file_name = entry.file_name();
        let reason = format!("panicked while processing: {}", message);
        if !source.is_file() {
            error!(
                "{} {} after the video left the incoming tree",
                file_name, reason
            );
            return ProcessOutcome::Vanished;
        }
        self.dead_letter(&source, &file_name, reason)
    }

    fn route(&self, entry: &QueueEntry) -> ProcessOutcome {
        let source = entry.full_path();
        let file_name = entry.file_name();

        if !source.is_file() {
            warn!("Skipping {}: file no longer exists", source.display());
            return ProcessOutcome::Vanished;
        }

        let identity = match VideoIdentity::parse(&entry.base_name) {
            Ok(identity) => identity,
            Err(e) => return self.route_error(&source, &file_name, CctvError::from(e)),
        };
        let camera = match self.registry.lookup(&identity.camera_name) {
            Ok(camera) => camera,
            Err(e) => return self.route_error(&source, &file_name, e),
        };

        let friendly_name = identity.friendly_name(&entry.extension);
        info!("ANALYSING {} (camera {})", source.display(), camera.name);

        match self
            .decider
            .decide(&source, camera, self.classifier.as_ref())
        {
            Ok(verdict) if verdict.accepted => {
                self.accept(&source, &file_name, &friendly_name, &identity, camera, verdict)
            }
            Ok(verdict) => {
                info!(
                    "No accepted detection in {} after {} inferences",
                    file_name, verdict.frames_inferred
                );
                self.reject(&source, &file_name, &friendly_name)
            }
            Err(CctvError::Decode(e)) => {
                warn!("Treating {} as rejected: {}", file_name, e);
                self.reject(&source, &file_name, &friendly_name)
            }
            Err(e) => self.dead_letter(&source, &file_name, e.to_string()),
        }
    }

    fn accept(
        &self,
        source: &Path,
        file_name: &str,
        friendly_name: &str,
        identity: &VideoIdentity,
        camera: &Camera,
        verdict: Verdict,
    ) -> ProcessOutcome {
        let target = match self.relocate(source, file_name, &self.outputs.accepted, friendly_name) {
            Ok(target) => target,
            Err(outcome) => return outcome,
        };
        info!("ACCEPTED {} -> {}", file_name, target.display());

        let (snapshots_written, snapshots_failed) =
            match (&verdict.accepting_frame, &verdict.classifier_response) {
                (Some(frame), Some(response)) => {
                    let outputs = [
                        self.outputs
                            .accepted
                            .join(identity.friendly_snapshot_name()),
                        self.outputs.latest_detection.join(snapshot_name(&camera.name)),
                    ];
                    let report = self
                        .snapshots
                        .archive_snapshot(frame, response, camera, &outputs);
                    if !report.is_complete() {
                        warn!(
                            "{} of {} snapshots for {} could not be written",
                            report.failed.len(),
                            outputs.len(),
                            file_name
                        );
                    }
                    (report.written.len(), report.failed.len())
                }
                _ => (0, 0),
            };

        ProcessOutcome::Accepted {
            target,
            snapshots_written,
            snapshots_failed,
        }
    }

    fn reject(&self, source: &Path, file_name: &str, friendly_name: &str) -> ProcessOutcome {
        match self.relocate(source, file_name, &self.outputs.rejected, friendly_name) {
            Ok(target) => {
                info!("REJECTED {} -> {}", file_name, target.display());
                ProcessOutcome::Rejected { target }
            }
            Err(outcome) => outcome,
        }
    }

    fn route_error(&self, source: &Path, file_name: &str, cause: CctvError) -> ProcessOutcome {
        let reason = cause.to_string();
        match self.relocate(source, file_name, &self.outputs.rejected, file_name) {
            Ok(target) => {
                warn!("ERROR-ROUTED {} -> {}: {}", file_name, target.display(), reason);
                ProcessOutcome::ErrorRouted { target, reason }
            }
            Err(outcome) => outcome,
        }
    }

    /// Move with retries; on failure the video is dead-lettered instead
    fn relocate(
        &self,
        source: &Path,
        file_name: &str,
        target_dir: &Path,
        target_name: &str,
    ) -> std::result::Result<PathBuf, ProcessOutcome> {
        self.move_retry
            .run(
                "relocate",
                || self.mover.relocate(source, target_dir, target_name),
                FilesystemError::is_retryable,
            )
            .map_err(|exhausted| {
                self.dead_letter(source, file_name, exhausted.last_error.to_string())
            })
    }

    fn dead_letter(&self, source: &Path, file_name: &str, reason: String) -> ProcessOutcome {
        match self
            .mover
            .relocate(source, &self.outputs.dead_letter, file_name)
        {
            Ok(target) => {
                error!("DEAD-LETTERED {} -> {}: {}", file_name, target.display(), reason);
                ProcessOutcome::DeadLettered { target, reason }
            }
            Err(e) => {
                error!(
                    "Could not dead-letter {} ({}); leaving it at {} after: {}",
                    file_name,
                    e,
                    source.display(),
                    reason
                );
                ProcessOutcome::Stranded { reason }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
