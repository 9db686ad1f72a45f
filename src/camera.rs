use crate::error::{CctvError, Result};
use crate::geometry::Polygon;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A configured camera
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Camera {
    /// Name as it appears in recording filenames
    pub name: String,

    /// Minimum classifier confidence for detections on this camera
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Optional region of interest; detections must touch it to count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi: Option<Polygon>,
}

impl Camera {
    pub fn new<S: Into<String>>(name: S, min_confidence: f32, roi: Option<Polygon>) -> Self {
        Self {
            name: name.into(),
            min_confidence,
            roi,
        }
    }
}

pub(crate) fn default_min_confidence() -> f32 {
    0.5
}

/// Immutable set of cameras keyed by exact name
#[derive(Debug, Clone, Default)]
pub struct CameraRegistry {
    cameras: HashMap<String, Camera>,
}

impl CameraRegistry {
    /// Build a registry; camera names must be unique
    pub fn new(cameras: Vec<Camera>) -> Result<Self> {
        let mut map = HashMap::with_capacity(cameras.len());
        for camera in cameras {
            if map.contains_key(&camera.name) {
                return Err(CctvError::config(format!(
                    "Camera '{}' is configured more than once",
                    camera.name
                )));
            }
            map.insert(camera.name.clone(), camera);
        }
        Ok(Self { cameras: map })
    }

    pub fn lookup(&self, name: &str) -> Result<&Camera> {
        self.cameras
            .get(name)
            .ok_or_else(|| CctvError::UnknownCamera {
                name: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}
