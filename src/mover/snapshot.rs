use crate::camera::Camera;
use crate::detection::DetectionResponse;
use crate::error::{DecodeError, FilesystemError};
use crate::frame::{encode_jpeg, FrameData};
use crate::geometry::{BoundingBox, Polygon};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const BOX_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);
const ROI_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
const LINE_THICKNESS: i32 = 2;

/// Which snapshot outputs were written
#[derive(Debug, Default)]
pub struct SnapshotReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, FilesystemError)>,
}

impl SnapshotReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Renders the accepting frame and writes it to each output path
#[derive(Debug, Clone, Copy)]
pub struct SnapshotWriter {
    annotate: bool,
    draw_roi: bool,
}

impl SnapshotWriter {
    pub fn new(annotate: bool, draw_roi: bool) -> Self {
        Self { annotate, draw_roi }
    }

    /// Write the frame to every output.
    ///
    /// Outputs are independent: a failure on one is recorded in the report
    /// and the remaining outputs are still attempted.
    pub fn archive_snapshot(
        &self,
        frame: &FrameData,
        response: &DetectionResponse,
        camera: &Camera,
        outputs: &[PathBuf],
    ) -> SnapshotReport {
        let mut report = SnapshotReport::default();

        let jpeg = match self.render(frame, response, camera) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!("Failed to render snapshot for {}: {}", camera.name, e);
                for output in outputs {
                    report.failed.push((
                        output.clone(),
                        FilesystemError::Write {
                            path: output.clone(),
                            details: e.to_string(),
                        },
                    ));
                }
                return report;
            }
        };

        for output in outputs {
            match write_replacing(output, &jpeg) {
                Ok(()) => {
                    debug!("Wrote snapshot {}", output.display());
                    report.written.push(output.clone());
                }
                Err(e) => {
                    warn!("{}", e);
                    report.failed.push((output.clone(), e));
                }
            }
        }
        report
    }

    /// Encode the frame as JPEG, with detection boxes and optionally the ROI drawn on it
    pub fn render(
        &self,
        frame: &FrameData,
        response: &DetectionResponse,
        camera: &Camera,
    ) -> Result<Vec<u8>, DecodeError> {
        if !self.annotate && !self.draw_roi {
            return frame.to_jpeg();
        }

        let mut image = frame.to_rgb_image()?;
        if self.annotate {
            for detection in &response.detections {
                draw_box(&mut image, &detection.bounding_box);
            }
        }
        if self.draw_roi {
            if let Some(roi) = &camera.roi {
                draw_polygon(&mut image, roi);
            }
        }

        encode_jpeg(image.as_raw(), image.width(), image.height()).map_err(|details| {
            DecodeError::Encode {
                frame_index: frame.index,
                details,
            }
        })
    }
}

fn draw_box(image: &mut RgbImage, bbox: &BoundingBox) {
    // Box corners are inclusive
    let width = bbox.width() as i32 + 1;
    let height = bbox.height() as i32 + 1;
    for inset in 0..LINE_THICKNESS {
        let w = width - 2 * inset;
        let h = height - 2 * inset;
        if w < 1 || h < 1 {
            break;
        }
        let rect = Rect::at(bbox.x_min + inset, bbox.y_min + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, rect, BOX_COLOUR);
    }
}

fn draw_polygon(image: &mut RgbImage, roi: &Polygon) {
    for (a, b) in roi.edges() {
        for offset in 0..LINE_THICKNESS {
            let o = offset as f32;
            draw_line_segment_mut(
                image,
                (a.x as f32 + o, a.y as f32 + o),
                (b.x as f32 + o, b.y as f32 + o),
                ROI_COLOUR,
            );
        }
    }
}

/// Replace `path` with `data` through a sibling temp file so readers never see a partial image
fn write_replacing(path: &Path, data: &[u8]) -> Result<(), FilesystemError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&temp, data).map_err(|e| FilesystemError::Write {
        path: path.to_path_buf(),
        details: e.to_string(),
    })?;

    fs::rename(&temp, path).map_err(|source| {
        let _ = fs::remove_file(&temp);
        FilesystemError::Rename {
            from: temp.clone(),
            to: path.to_path_buf(),
            source,
        }
    })
}
