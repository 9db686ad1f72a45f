//! Accept/reject decision for a single video.

use crate::camera::Camera;
use crate::detection::{Detection, DetectionClient, DetectionResponse};
use crate::error::{CctvError, ClassifierError, Result};
use crate::frame::FrameData;
use crate::recovery::RetryPolicy;
use crate::sampler::{FrameSampler, VideoOpener};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of analysing a video
#[derive(Debug, Clone)]
pub struct Verdict {
    pub accepted: bool,
    /// Frame holding the first qualifying detection
    pub accepting_frame: Option<FrameData>,
    /// Full classifier response for that frame
    pub classifier_response: Option<DetectionResponse>,
    /// The qualifying detection itself
    pub detection: Option<Detection>,
    /// Number of frames sent to the classifier
    pub frames_inferred: u64,
}

impl Verdict {
    pub fn rejected(frames_inferred: u64) -> Self {
        Self {
            accepted: false,
            accepting_frame: None,
            classifier_response: None,
            detection: None,
            frames_inferred,
        }
    }

    fn accepted(
        frame: FrameData,
        response: DetectionResponse,
        detection: Detection,
        frames_inferred: u64,
    ) -> Self {
        Self {
            accepted: true,
            accepting_frame: Some(frame),
            classifier_response: Some(response),
            detection: Some(detection),
            frames_inferred,
        }
    }
}

/// Samples frames, asks the classifier about each and accepts on the first
/// detection with a whitelisted label that touches the camera's ROI.
pub struct AdmissionDecider {
    accepted_labels: HashSet<String>,
    frame_stride: u64,
    retry: RetryPolicy,
    opener: Arc<dyn VideoOpener>,
}

impl AdmissionDecider {
    pub fn new<I, S>(
        accepted_labels: I,
        frame_stride: u64,
        retry: RetryPolicy,
        opener: Arc<dyn VideoOpener>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted_labels: accepted_labels.into_iter().map(Into::into).collect(),
            frame_stride,
            retry,
            opener,
        }
    }

    /// Whether a single detection qualifies for the camera.
    ///
    /// The threshold is checked here too; servers are free to ignore it.
    pub fn is_accepted_detection(&self, detection: &Detection, camera: &Camera) -> bool {
        if detection.confidence < camera.min_confidence {
            return false;
        }
        if !self.accepted_labels.contains(&detection.label) {
            return false;
        }
        match &camera.roi {
            None => true,
            Some(roi) => roi.intersects_box(&detection.bounding_box),
        }
    }

    /// Open and analyse a video file.
    ///
    /// Fails with `Decode` when the file cannot be opened and with `Classifier`
    /// when the classifier stays unavailable through the retry policy.
    pub fn decide(
        &self,
        video: &Path,
        camera: &Camera,
        classifier: &dyn DetectionClient,
    ) -> Result<Verdict> {
        let source = self.opener.open(video)?;
        let mut frames = FrameSampler::new(source, self.frame_stride);
        let verdict = self.decide_frames(&mut frames, camera, classifier)?;
        debug!(
            "Decoded {} frames of {}, inferred {}",
            frames.decoded_frames(),
            video.display(),
            verdict.frames_inferred
        );
        Ok(verdict)
    }

    /// Decide over an already sampled frame sequence, stopping at the first match
    pub fn decide_frames<I>(
        &self,
        frames: I,
        camera: &Camera,
        classifier: &dyn DetectionClient,
    ) -> Result<Verdict>
    where
        I: IntoIterator<Item = FrameData>,
    {
        let mut frames_inferred = 0;

        for frame in frames {
            let jpeg = match frame.to_jpeg() {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    warn!("Skipping frame {}: {}", frame.index, e);
                    continue;
                }
            };

            let response = self
                .retry
                .run(
                    classifier.name(),
                    || classifier.detect(&jpeg, camera.min_confidence),
                    ClassifierError::is_transient,
                )
                .map_err(|exhausted| {
                    CctvError::Classifier(ClassifierError::Exhausted {
                        attempts: exhausted.attempts,
                        last_error: exhausted.last_error.to_string(),
                    })
                })?;
            frames_inferred += 1;

            let matched = response
                .detections
                .iter()
                .find(|d| self.is_accepted_detection(d, camera))
                .cloned();

            if let Some(detection) = matched {
                info!(
                    "{} detected on {} frame {} (confidence {:.2})",
                    detection.label, camera.name, frame.index, detection.confidence
                );
                return Ok(Verdict::accepted(
                    frame,
                    response,
                    detection,
                    frames_inferred,
                ));
            }
        }

        Ok(Verdict::rejected(frames_inferred))
    }
}
