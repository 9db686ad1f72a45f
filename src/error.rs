use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CctvError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Filename error: {0}")]
    Filename(#[from] FilenameError),

    #[error("Unknown camera '{name}'")]
    UnknownCamera { name: String },

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Video filename does not follow the `<camera>_<index>_<YYYYMMDDHHMMSS>` convention
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilenameError {
    #[error("'{base_name}' does not have three underscore-separated segments")]
    MissingSegments { base_name: String },

    #[error("'{base_name}' has an empty camera name")]
    EmptyCameraName { base_name: String },

    #[error("'{base_name}' has an invalid timestamp '{timestamp}'")]
    InvalidTimestamp {
        base_name: String,
        timestamp: String,
    },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open video {}: {details}", path.display())]
    Open { path: PathBuf, details: String },

    #[error("Failed to read video {}: {details}", path.display())]
    Read { path: PathBuf, details: String },

    #[error("Failed to encode frame {frame_index}: {details}")]
    Encode { frame_index: u64, details: String },

    #[error("No video decoder available: {details}")]
    Unsupported { details: String },
}

#[derive(Error, Debug, Clone)]
pub enum ClassifierError {
    #[error("Classifier request failed: {details}")]
    Request { details: String },

    #[error("Classifier rejected the request: {details}")]
    Rejected { details: String },

    #[error("Malformed classifier response: {details}")]
    Response { details: String },

    #[error("Classifier unavailable after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Error, Debug)]
pub enum FilesystemError {
    #[error("Source {} does not exist", path.display())]
    SourceMissing { path: PathBuf },

    #[error("Target {} already exists", path.display())]
    TargetExists { path: PathBuf },

    #[error("Failed to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {details}", path.display())]
    Write { path: PathBuf, details: String },
}

impl CctvError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(config::ConfigError::Message(message.into()))
    }

    /// Only configuration problems stop the process; everything else is handled per video
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CctvError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, CctvError>;
