//! In-memory stand-ins for the decoder and classifier used across unit tests.

use crate::detection::{Detection, DetectionClient, DetectionResponse};
use crate::error::{ClassifierError, DecodeError};
use crate::frame::{solid_frame, FrameData};
use crate::geometry::BoundingBox;
use crate::sampler::{FrameSource, VideoOpener};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Decoder yielding `total` small frames, optionally failing at a given frame
pub(crate) struct SyntheticSource {
    total: u64,
    fail_at: Option<u64>,
    produced: u64,
    decoded: Arc<AtomicU64>,
}

impl SyntheticSource {
    pub(crate) fn new(total: u64) -> Self {
        Self {
            total,
            fail_at: None,
            produced: 0,
            decoded: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn failing_at(mut self, frame: u64) -> Self {
        self.fail_at = Some(frame);
        self
    }

    pub(crate) fn decoded_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.decoded)
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<FrameData>, DecodeError> {
        if self.fail_at == Some(self.produced + 1) {
            return Err(DecodeError::Read {
                path: PathBuf::from("synthetic"),
                details: format!("corrupt packet at frame {}", self.produced + 1),
            });
        }
        if self.produced >= self.total {
            return Ok(None);
        }
        self.produced += 1;
        self.decoded.fetch_add(1, Ordering::SeqCst);
        Ok(Some(solid_frame(0, 8, 8, [40, 80, 120])))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum FakeVideo {
    Frames(u64),
    Unreadable,
    /// The decoder panics when the file is opened
    Panics,
}

/// Opener that serves synthetic videos keyed by file name
pub(crate) struct FakeVideoOpener {
    videos: Mutex<HashMap<String, FakeVideo>>,
    default: FakeVideo,
    opened: Mutex<Vec<PathBuf>>,
}

impl FakeVideoOpener {
    pub(crate) fn new(default: FakeVideo) -> Self {
        Self {
            videos: Mutex::new(HashMap::new()),
            default,
            opened: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_video(self, file_name: &str, video: FakeVideo) -> Self {
        self.videos.lock().insert(file_name.to_string(), video);
        self
    }

    pub(crate) fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().clone()
    }
}

impl VideoOpener for FakeVideoOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, DecodeError> {
        self.opened.lock().push(path.to_path_buf());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let video = self.videos.lock().get(&name).copied().unwrap_or(self.default);
        match video {
            FakeVideo::Frames(total) => Ok(Box::new(SyntheticSource::new(total))),
            FakeVideo::Unreadable => Err(DecodeError::Open {
                path: path.to_path_buf(),
                details: "moov atom not found".to_string(),
            }),
            FakeVideo::Panics => panic!("decoder crashed on {}", name),
        }
    }
}

/// Classifier answering from a per-call script
pub(crate) struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<DetectionResponse, ClassifierError>>>,
    fallback: Result<DetectionResponse, ClassifierError>,
    calls: AtomicU64,
    thresholds: Mutex<Vec<f32>>,
}

impl ScriptedClassifier {
    /// Answers every call with no detections unless scripted otherwise
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Ok(DetectionResponse::default()),
            calls: AtomicU64::new(0),
            thresholds: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn then(self, response: Result<DetectionResponse, ClassifierError>) -> Self {
        self.script.lock().push_back(response);
        self
    }

    pub(crate) fn then_detections(self, detections: Vec<Detection>) -> Self {
        self.then(Ok(DetectionResponse::new(detections)))
    }

    pub(crate) fn otherwise(mut self, response: Result<DetectionResponse, ClassifierError>) -> Self {
        self.fallback = response;
        self
    }

    pub(crate) fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn thresholds(&self) -> Vec<f32> {
        self.thresholds.lock().clone()
    }
}

impl DetectionClient for ScriptedClassifier {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&self, image: &[u8], min_confidence: f32) -> Result<DetectionResponse, ClassifierError> {
        assert_eq!(&image[..2], &[0xFF, 0xD8], "classifier must receive JPEG data");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.thresholds.lock().push(min_confidence);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

pub(crate) fn person(confidence: f32, x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Detection {
    Detection::new(
        "person",
        confidence,
        BoundingBox::new(x_min, y_min, x_max, y_max),
    )
}
