pub mod admission;
pub mod app;
pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod filename;
pub mod frame;
pub mod geometry;
pub mod mover;
pub mod pipeline;
pub mod queue;
pub mod recovery;
pub mod sampler;
pub mod watcher;

#[cfg(test)]
mod testing;

pub use admission::{AdmissionDecider, Verdict};
pub use app::{CctvOrchestrator, ComponentState, ShutdownReason};
pub use camera::{Camera, CameraRegistry};
pub use config::CctvConfig;
pub use detection::{Detection, DetectionClient, DetectionResponse};
pub use error::{CctvError, Result};
pub use filename::{snapshot_name, VideoIdentity, VideoPath};
pub use frame::FrameData;
pub use geometry::{BoundingBox, Point, Polygon};
pub use mover::{Mover, SnapshotWriter};
pub use pipeline::{OutputPaths, PipelineStatsSnapshot, ProcessOutcome, VideoProcessor};
pub use queue::IngestionQueue;
pub use recovery::RetryPolicy;
pub use sampler::{FrameSampler, FrameSource, VideoOpener};
pub use watcher::{FileEventHandler, FileEventSource};

#[cfg(feature = "deepstack")]
pub use detection::DeepStackClient;
