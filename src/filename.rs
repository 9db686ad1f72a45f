//! Camera recording naming convention.
//!
//! Cameras write `<camera name>_<camera index>_<YYYYMMDDHHMMSS>.<ext>`, for example
//! `Front Door_01_20210511082721.mp4`. Processed videos are renamed to
//! `2021-05-11 08-27-21 (Front Door).mp4`.

use crate::error::FilenameError;
use chrono::NaiveDateTime;
use std::fmt;
use std::path::{Path, PathBuf};

const CAMERA_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const CAMERA_TIMESTAMP_LEN: usize = 14;
const FRIENDLY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H-%M-%S";
const SNAPSHOT_EXTENSION: &str = "jpg";

/// Location of a video file split into directory, base name and extension
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoPath {
    pub directory: PathBuf,
    pub base_name: String,
    pub extension: String,
}

impl VideoPath {
    pub fn new<D: Into<PathBuf>, B: Into<String>, E: Into<String>>(
        directory: D,
        base_name: B,
        extension: E,
    ) -> Self {
        Self {
            directory: directory.into(),
            base_name: base_name.into(),
            extension: extension.into(),
        }
    }

    /// Split a path; returns `None` for paths without a UTF-8 file stem
    pub fn from_path(path: &Path) -> Option<Self> {
        let base_name = path.file_stem()?.to_str()?.to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Some(Self {
            directory,
            base_name,
            extension,
        })
    }

    pub fn file_name(&self) -> String {
        if self.extension.is_empty() {
            self.base_name.clone()
        } else {
            format!("{}.{}", self.base_name, self.extension)
        }
    }

    pub fn full_path(&self) -> PathBuf {
        self.directory.join(self.file_name())
    }

    /// Case-insensitive extension match
    pub fn has_extension(&self, extension: &str) -> bool {
        self.extension.eq_ignore_ascii_case(extension)
    }
}

impl fmt::Display for VideoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path().display())
    }
}

/// Camera metadata carried in a recording's base name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoIdentity {
    pub camera_name: String,
    pub camera_index: String,
    pub captured_at: NaiveDateTime,
}

impl VideoIdentity {
    /// Parse a base name (no extension) such as `CamA_01_20210511082721`
    pub fn parse(base_name: &str) -> Result<Self, FilenameError> {
        let mut segments = base_name.rsplitn(3, '_');
        let (Some(timestamp), Some(camera_index), Some(camera_name)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(FilenameError::MissingSegments {
                base_name: base_name.to_string(),
            });
        };

        if camera_name.is_empty() {
            return Err(FilenameError::EmptyCameraName {
                base_name: base_name.to_string(),
            });
        }

        let invalid_timestamp = || FilenameError::InvalidTimestamp {
            base_name: base_name.to_string(),
            timestamp: timestamp.to_string(),
        };
        if timestamp.len() != CAMERA_TIMESTAMP_LEN || !timestamp.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid_timestamp());
        }
        let captured_at = NaiveDateTime::parse_from_str(timestamp, CAMERA_TIMESTAMP_FORMAT)
            .map_err(|_| invalid_timestamp())?;

        Ok(Self {
            camera_name: camera_name.to_string(),
            camera_index: camera_index.to_string(),
            captured_at,
        })
    }

    /// Human readable name, e.g. `2021-05-11 08-27-21 (CamA).mp4`
    pub fn friendly_name(&self, extension: &str) -> String {
        format!(
            "{} ({}).{}",
            self.captured_at.format(FRIENDLY_TIMESTAMP_FORMAT),
            self.camera_name,
            extension
        )
    }

    /// Name of the archived snapshot that sits next to an accepted video
    pub fn friendly_snapshot_name(&self) -> String {
        self.friendly_name(SNAPSHOT_EXTENSION)
    }
}

/// Name of the always-overwritten latest detection image for a camera
pub fn snapshot_name(camera_name: &str) -> String {
    format!(
        "{}.{}",
        camera_name.to_lowercase().replace(' ', "_"),
        SNAPSHOT_EXTENSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_well_formed_name() {
        let identity = VideoIdentity::parse("CamA_01_20210511082721").unwrap();
        assert_eq!(identity.camera_name, "CamA");
        assert_eq!(identity.camera_index, "01");
        assert_eq!(
            identity.captured_at,
            NaiveDate::from_ymd_opt(2021, 5, 11)
                .unwrap()
                .and_hms_opt(8, 27, 21)
                .unwrap()
        );
        assert_eq!(
            identity.friendly_name("mp4"),
            "2021-05-11 08-27-21 (CamA).mp4"
        );
    }

    #[test]
    fn test_camera_name_may_contain_underscores_and_spaces() {
        let identity = VideoIdentity::parse("Front_Door Left_02_20230101000000").unwrap();
        assert_eq!(identity.camera_name, "Front_Door Left");
        assert_eq!(identity.camera_index, "02");
    }

    #[test]
    fn test_friendly_name_is_stable() {
        let a = VideoIdentity::parse("Garden_00_19991231235959").unwrap();
        let b = VideoIdentity::parse("Garden_00_19991231235959").unwrap();
        assert_eq!(a.friendly_name("mp4"), b.friendly_name("mp4"));
        assert_eq!(a.friendly_snapshot_name(), "1999-12-31 23-59-59 (Garden).jpg");
    }

    #[test]
    fn test_parse_failures_are_typed() {
        assert!(matches!(
            VideoIdentity::parse("no-underscores"),
            Err(FilenameError::MissingSegments { .. })
        ));
        assert!(matches!(
            VideoIdentity::parse("CamA_20210511082721"),
            Err(FilenameError::MissingSegments { .. })
        ));
        assert!(matches!(
            VideoIdentity::parse("_01_20210511082721"),
            Err(FilenameError::EmptyCameraName { .. })
        ));
        assert!(matches!(
            VideoIdentity::parse("CamA_01_2021051108272"),
            Err(FilenameError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            VideoIdentity::parse("CamA_01_20211341082721"),
            Err(FilenameError::InvalidTimestamp { .. })
        ));
        assert!(matches!(
            VideoIdentity::parse("CamA_01_+0210511082721"),
            Err(FilenameError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_snapshot_name() {
        assert_eq!(snapshot_name("Front Door"), "front_door.jpg");
        assert_eq!(snapshot_name("Garden"), "garden.jpg");
    }

    #[test]
    fn test_video_path_split() {
        let path = VideoPath::from_path(Path::new("/in/2021/CamA_01_20210511082721.MP4")).unwrap();
        assert_eq!(path.directory, PathBuf::from("/in/2021"));
        assert_eq!(path.base_name, "CamA_01_20210511082721");
        assert!(path.has_extension("mp4"));
        assert_eq!(
            path.full_path(),
            PathBuf::from("/in/2021/CamA_01_20210511082721.MP4")
        );
    }
}
