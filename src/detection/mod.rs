//! Object detection types and the classifier seam.

#[cfg(feature = "deepstack")]
mod deepstack;

#[cfg(feature = "deepstack")]
pub use deepstack::DeepStackClient;

use crate::error::ClassifierError;
use crate::geometry::BoundingBox;
use serde::{Deserialize, Serialize};

/// A single labelled object found in an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

impl Detection {
    pub fn new<S: Into<String>>(label: S, confidence: f32, bounding_box: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bounding_box,
        }
    }
}

/// Detections returned for one image, in classifier order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub detections: Vec<Detection>,
}

impl DetectionResponse {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Synchronous object classifier.
///
/// Calls may take arbitrarily long; implementations should bound them with a timeout.
pub trait DetectionClient: Send + Sync {
    /// Client identifier for logs
    fn name(&self) -> &'static str;

    /// Detect objects in a JPEG image, dropping anything below `min_confidence`
    fn detect(&self, image: &[u8], min_confidence: f32) -> Result<DetectionResponse, ClassifierError>;
}

impl ClassifierError {
    /// Transport failures and server-side errors may clear up on their own
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClassifierError::Request { .. } | ClassifierError::Rejected { .. }
        )
    }
}
