use crate::error::DecodeError;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::sync::Arc;

/// JPEG quality used for classifier uploads and snapshots
pub const JPEG_QUALITY: u8 = 90;

/// A decoded video frame in packed RGB24
#[derive(Debug, Clone)]
pub struct FrameData {
    /// 1-based position of the frame in the video
    pub index: u64,
    /// Raw RGB24 pixels (shared ownership for efficiency)
    pub pixels: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl FrameData {
    pub fn new(index: u64, pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            index,
            pixels: Arc::new(pixels),
            width,
            height,
        }
    }

    /// Expected buffer length for the frame dimensions
    pub fn expected_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn validate_size(&self) -> bool {
        self.pixels.len() == self.expected_size()
    }

    /// Copy into an owned image buffer for drawing
    pub fn to_rgb_image(&self) -> Result<RgbImage, DecodeError> {
        RgbImage::from_raw(self.width, self.height, self.pixels.to_vec()).ok_or_else(|| {
            DecodeError::Encode {
                frame_index: self.index,
                details: format!(
                    "buffer of {} bytes does not hold a {}x{} RGB frame",
                    self.pixels.len(),
                    self.width,
                    self.height
                ),
            }
        })
    }

    /// Encode the frame as JPEG
    pub fn to_jpeg(&self) -> Result<Vec<u8>, DecodeError> {
        if !self.validate_size() {
            return Err(DecodeError::Encode {
                frame_index: self.index,
                details: format!(
                    "expected {} bytes, got {}",
                    self.expected_size(),
                    self.pixels.len()
                ),
            });
        }
        encode_jpeg(&self.pixels, self.width, self.height).map_err(|details| {
            DecodeError::Encode {
                frame_index: self.index,
                details,
            }
        })
    }
}

pub(crate) fn encode_jpeg(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    encoder
        .encode(pixels, width, height, image::ColorType::Rgb8)
        .map_err(|e| e.to_string())?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) fn solid_frame(index: u64, width: u32, height: u32, rgb: [u8; 3]) -> FrameData {
    let pixels = rgb
        .iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * 3)
        .collect();
    FrameData::new(index, pixels, width, height)
}
