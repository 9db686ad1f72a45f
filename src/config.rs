use crate::camera::{default_min_confidence, Camera};
use crate::geometry::Polygon;
use crate::recovery::RetryPolicy;
use crate::sampler::DEFAULT_FRAME_STRIDE;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct CctvConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub cameras: Vec<Camera>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Base URL of the DeepStack server, e.g. `http://deepstack:5000`
    #[serde(default)]
    pub url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct PathsConfig {
    /// Tree watched for new recordings
    #[serde(default)]
    pub incoming: PathBuf,
    #[serde(default)]
    pub accepted: PathBuf,
    #[serde(default)]
    pub rejected: PathBuf,
    /// Holds one always-current snapshot per camera
    #[serde(default)]
    pub latest_detection: PathBuf,
    /// Videos that could not be processed; defaults to `<rejected>/dead-letter`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DetectionConfig {
    /// Labels that make a video relevant
    #[serde(default = "default_accepted_labels")]
    pub accepted_labels: Vec<String>,

    /// Inference runs on every n-th decoded frame
    #[serde(default = "default_frame_stride")]
    pub frame_stride: u64,

    /// Draw detection boxes on saved snapshots
    #[serde(default = "default_annotate_snapshots")]
    pub annotate_snapshots: bool,

    /// Draw the camera ROI on saved snapshots
    #[serde(default)]
    pub draw_roi: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// Native notifications on Linux, polling elsewhere
    #[default]
    Auto,
    Native,
    Polling,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WatcherConfig {
    #[serde(default)]
    pub mode: WatchMode,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Longest time the consumer sleeps waiting for work before rechecking shutdown
    #[serde(default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,

    #[serde(default = "default_video_extension")]
    pub video_extension: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            accepted_labels: default_accepted_labels(),
            frame_stride: default_frame_stride(),
            annotate_snapshots: default_annotate_snapshots(),
            draw_roi: false,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            idle_wait_ms: default_idle_wait_ms(),
            video_extension: default_video_extension(),
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl PathsConfig {
    pub fn dead_letter_dir(&self) -> PathBuf {
        self.dead_letter
            .clone()
            .unwrap_or_else(|| self.rejected.join("dead-letter"))
    }

    /// Output directories that must exist before processing starts
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.accepted.clone(),
            self.rejected.clone(),
            self.latest_detection.clone(),
            self.dead_letter_dir(),
        ]
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    /// The concrete mode for this platform
    pub fn resolved_mode(&self) -> WatchMode {
        match self.mode {
            WatchMode::Auto if cfg!(target_os = "linux") => WatchMode::Native,
            WatchMode::Auto => WatchMode::Polling,
            mode => mode,
        }
    }
}

impl CctvConfig {
    /// Load configuration from a specific file path, then apply the environment
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_sources(path.as_ref())?;
        config.apply_legacy_env(std::env::vars())?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    fn from_sources(path: &Path) -> Result<Self, ConfigError> {
        let path_str = path.to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("classifier.timeout_seconds", default_timeout_seconds())?
            .set_default("detection.accepted_labels", default_accepted_labels())?
            .set_default("detection.frame_stride", default_frame_stride())?
            .set_default("detection.annotate_snapshots", default_annotate_snapshots())?
            .set_default("detection.draw_roi", false)?
            .set_default("watcher.poll_interval_ms", default_poll_interval_ms())?
            .set_default("watcher.idle_wait_ms", default_idle_wait_ms())?
            .set_default("watcher.video_extension", default_video_extension())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables such as CCTV__PATHS__INCOMING
            .add_source(
                Environment::with_prefix("CCTV")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Apply the flat variables used by existing container deployments.
    ///
    /// When `CAMERA_1` is set, the numbered camera groups replace any cameras
    /// from the file. Groups are read until the first missing `CAMERA_<n>`.
    pub fn apply_legacy_env<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: std::collections::HashMap<String, String> = vars.into_iter().collect();

        if let Some(url) = vars.get("DEEPSTACK_URL") {
            self.classifier.url = url.clone();
        }
        for (key, target) in [
            ("INCOMING_DIR_PATH", &mut self.paths.incoming),
            ("ACCEPTED_DIR_PATH", &mut self.paths.accepted),
            ("REJECTED_DIR_PATH", &mut self.paths.rejected),
            ("LATEST_DETECTION_PATH", &mut self.paths.latest_detection),
        ] {
            if let Some(value) = vars.get(key) {
                *target = PathBuf::from(value);
            }
        }
        if let Some(draw_roi) = vars.get("DRAW_ROI") {
            self.detection.draw_roi = draw_roi.eq_ignore_ascii_case("true");
        }

        let mut cameras = Vec::new();
        for n in 1.. {
            let Some(name) = vars.get(&format!("CAMERA_{}", n)) else {
                break;
            };

            let min_confidence = match vars.get(&format!("CAMERA_{}_MIN_CONFIDENCE", n)) {
                Some(raw) => raw.trim().parse::<f32>().map_err(|e| {
                    ConfigError::Message(format!(
                        "CAMERA_{}_MIN_CONFIDENCE '{}' is not a number: {}",
                        n, raw, e
                    ))
                })?,
                None => default_min_confidence(),
            };

            let roi = match vars.get(&format!("CAMERA_{}_ROI", n)) {
                Some(raw) => Some(serde_json::from_str::<Polygon>(raw).map_err(|e| {
                    ConfigError::Message(format!(
                        "CAMERA_{}_ROI is not a JSON list of [x, y] points: {}",
                        n, e
                    ))
                })?),
                None => None,
            };

            cameras.push(Camera::new(name.clone(), min_confidence, roi));
        }
        if !cameras.is_empty() {
            debug!("Using {} cameras from environment", cameras.len());
            self.cameras = cameras;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classifier.url.trim().is_empty() {
            return Err(ConfigError::Message(
                "Classifier URL (DEEPSTACK_URL) must be set".to_string(),
            ));
        }

        if self.classifier.timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "Classifier timeout_seconds must be greater than 0".to_string(),
            ));
        }

        for (name, path) in [
            ("incoming", &self.paths.incoming),
            ("accepted", &self.paths.accepted),
            ("rejected", &self.paths.rejected),
            ("latest_detection", &self.paths.latest_detection),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Message(format!(
                    "Path '{}' must be set",
                    name
                )));
            }
        }

        if self.detection.accepted_labels.is_empty() {
            return Err(ConfigError::Message(
                "At least one accepted label is required".to_string(),
            ));
        }

        if self.detection.frame_stride == 0 {
            return Err(ConfigError::Message(
                "Frame stride must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Retry max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.watcher.video_extension.is_empty() {
            return Err(ConfigError::Message(
                "Video extension must not be empty".to_string(),
            ));
        }

        if self.watcher.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for camera in &self.cameras {
            if camera.name.is_empty() {
                return Err(ConfigError::Message(
                    "Camera name must not be empty".to_string(),
                ));
            }
            if !names.insert(camera.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Camera '{}' is configured more than once",
                    camera.name
                )));
            }
            if !(0.0..=1.0).contains(&camera.min_confidence) {
                return Err(ConfigError::Message(format!(
                    "Camera '{}' min_confidence {} is outside [0, 1]",
                    camera.name, camera.min_confidence
                )));
            }
            if let Some(roi) = &camera.roi {
                if roi.len() < 3 {
                    return Err(ConfigError::Message(format!(
                        "Camera '{}' ROI needs at least three points",
                        camera.name
                    )));
                }
            }
        }

        Ok(())
    }
}

fn default_timeout_seconds() -> u64 {
    30
}
fn default_accepted_labels() -> Vec<String> {
    vec!["person".to_string()]
}
fn default_frame_stride() -> u64 {
    DEFAULT_FRAME_STRIDE
}
fn default_annotate_snapshots() -> bool {
    true
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_idle_wait_ms() -> u64 {
    1000
}
fn default_video_extension() -> String {
    "mp4".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> CctvConfig {
        let mut config = CctvConfig::default();
        config.classifier.url = "http://deepstack:5000".to_string();
        config.paths = PathsConfig {
            incoming: PathBuf::from("/data/incoming"),
            accepted: PathBuf::from("/data/accepted"),
            rejected: PathBuf::from("/data/rejected"),
            latest_detection: PathBuf::from("/data/latest"),
            dead_letter: None,
        };
        config.cameras = vec![Camera::new("Garden", 0.55, None)];
        config
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = CctvConfig::default();
        assert_eq!(config.detection.accepted_labels, vec!["person"]);
        assert_eq!(config.detection.frame_stride, 15);
        assert_eq!(config.watcher.idle_wait(), Duration::from_secs(1));
        assert_eq!(config.retry.max_attempts, 3);
        // Required settings are missing
        assert!(config.validate().is_err());
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[classifier]
url = "http://deepstack:5000"

[paths]
incoming = "/in"
accepted = "/ok"
rejected = "/no"
latest_detection = "/latest"

[detection]
accepted_labels = ["person", "cat"]
draw_roi = true

[retry]
max_attempts = 5

[watcher]
mode = "polling"

[[cameras]]
name = "Garden"
min_confidence = 0.55

[[cameras]]
name = "Side"
roi = [[0, 0], [100, 0], [100, 100], [0, 100]]
"#
        )
        .unwrap();

        let config = CctvConfig::from_sources(file.path()).unwrap();
        assert_eq!(config.classifier.timeout_seconds, 30);
        assert_eq!(config.paths.incoming, PathBuf::from("/in"));
        assert_eq!(config.paths.dead_letter_dir(), PathBuf::from("/no/dead-letter"));
        assert_eq!(config.detection.accepted_labels, vec!["person", "cat"]);
        assert_eq!(config.detection.frame_stride, 15);
        assert!(config.detection.draw_roi);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(500));
        assert_eq!(config.watcher.resolved_mode(), WatchMode::Polling);
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[1].min_confidence, 0.5);
        assert_eq!(config.cameras[1].roi.as_ref().unwrap().len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = CctvConfig::from_sources(Path::new("/nonexistent/cctv-filter.toml")).unwrap();
        assert_eq!(config.watcher.video_extension, "mp4");
        assert!(config.cameras.is_empty());
    }

    #[test]
    fn test_legacy_environment() {
        let mut config = CctvConfig::default();
        config.cameras = vec![Camera::new("FromFile", 0.9, None)];

        config
            .apply_legacy_env(vars(&[
                ("DEEPSTACK_URL", "http://deepstack:5000"),
                ("INCOMING_DIR_PATH", "/in"),
                ("ACCEPTED_DIR_PATH", "/ok"),
                ("REJECTED_DIR_PATH", "/no"),
                ("LATEST_DETECTION_PATH", "/latest"),
                ("DRAW_ROI", "True"),
                ("CAMERA_1", "Front Door"),
                ("CAMERA_1_MIN_CONFIDENCE", "0.7"),
                ("CAMERA_2", "Side"),
                ("CAMERA_2_ROI", "[[0, 0], [100, 0], [100, 100]]"),
                ("CAMERA_4", "Skipped"),
            ]))
            .unwrap();

        assert_eq!(config.classifier.url, "http://deepstack:5000");
        assert_eq!(config.paths.latest_detection, PathBuf::from("/latest"));
        assert!(config.detection.draw_roi);
        let names: Vec<_> = config.cameras.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Front Door", "Side"]);
        assert_eq!(config.cameras[0].min_confidence, 0.7);
        assert!(config.cameras[0].roi.is_none());
        assert_eq!(config.cameras[1].min_confidence, 0.5);
        assert_eq!(config.cameras[1].roi.as_ref().unwrap().len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_legacy_environment_without_cameras_keeps_file_cameras() {
        let mut config = valid_config();
        config
            .apply_legacy_env(vars(&[("DRAW_ROI", "false")]))
            .unwrap();
        assert_eq!(config.cameras.len(), 1);
        assert!(!config.detection.draw_roi);
    }

    #[test]
    fn test_legacy_environment_rejects_bad_values() {
        let mut config = CctvConfig::default();
        assert!(config
            .apply_legacy_env(vars(&[("CAMERA_1", "A"), ("CAMERA_1_ROI", "not json")]))
            .is_err());
        assert!(config
            .apply_legacy_env(vars(&[
                ("CAMERA_1", "A"),
                ("CAMERA_1_MIN_CONFIDENCE", "high")
            ]))
            .is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = valid_config();
        config.detection.frame_stride = 0;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.detection.accepted_labels.clear();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.paths.accepted = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.cameras.push(Camera::new("Garden", 0.5, None));
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.cameras[0].min_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.cameras[0].roi = Some(Polygon::from(vec![(0, 0), (1, 1)]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serializes_to_toml() {
        let text = toml::to_string_pretty(&valid_config()).unwrap();
        let parsed: CctvConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, valid_config());
    }
}
