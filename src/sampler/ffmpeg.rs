//! FFmpeg-backed video file decoder.

use super::{FrameSource, VideoOpener};
use crate::error::DecodeError;
use crate::frame::FrameData;
use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opens files with libavformat and decodes the best video stream
pub struct FfmpegVideoOpener;

impl FfmpegVideoOpener {
    pub fn new() -> Result<Self, DecodeError> {
        ffmpeg::init().map_err(|e| DecodeError::Unsupported {
            details: format!("failed to initialize ffmpeg: {}", e),
        })?;
        Ok(Self)
    }
}

impl VideoOpener for FfmpegVideoOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, DecodeError> {
        Ok(Box::new(FfmpegFrameSource::open(path)?))
    }
}

pub struct FfmpegFrameSource {
    path: PathBuf,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    eof_sent: bool,
}

impl FfmpegFrameSource {
    pub fn open(path: &Path) -> Result<Self, DecodeError> {
        let open_error = |details: String| DecodeError::Open {
            path: path.to_path_buf(),
            details,
        };

        let input = ffmpeg::format::input(&path).map_err(|e| open_error(e.to_string()))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| open_error("file has no video track".to_string()))?;
        let stream_index = input_stream.index();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .map_err(|e| open_error(format!("load decoder parameters: {}", e)))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| open_error(format!("open video decoder: {}", e)))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .map_err(|e| open_error(format!("create scaler: {}", e)))?;

        debug!(
            "Opened {} ({}x{})",
            path.display(),
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            path: path.to_path_buf(),
            input,
            stream_index,
            decoder,
            scaler,
            eof_sent: false,
        })
    }

    fn read_error(&self, details: String) -> DecodeError {
        DecodeError::Read {
            path: self.path.clone(),
            details,
        }
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<FrameData, DecodeError> {
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb_frame)
            .map_err(|e| self.read_error(format!("scale frame to RGB: {}", e)))?;

        let width = rgb_frame.width();
        let height = rgb_frame.height();
        let row_bytes = width as usize * 3;
        let stride = rgb_frame.stride(0);
        let data = rgb_frame.data(0);

        let pixels = if stride == row_bytes {
            data.get(..row_bytes * height as usize)
                .ok_or_else(|| self.read_error("frame buffer is truncated".to_string()))?
                .to_vec()
        } else {
            let mut pixels = Vec::with_capacity(row_bytes * height as usize);
            for row in 0..height as usize {
                let start = row * stride;
                let line = data
                    .get(start..start + row_bytes)
                    .ok_or_else(|| self.read_error("frame row is out of bounds".to_string()))?;
                pixels.extend_from_slice(line);
            }
            pixels
        };

        // Index is assigned by the sampler
        Ok(FrameData::new(0, pixels, width, height))
    }
}

impl FrameSource for FfmpegFrameSource {
    fn next_frame(&mut self) -> Result<Option<FrameData>, DecodeError> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut fed = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder.send_packet(&packet).map_err(|e| DecodeError::Read {
                    path: self.path.clone(),
                    details: format!("send packet to decoder: {}", e),
                })?;
                fed = true;
                break;
            }

            if !fed {
                self.decoder.send_eof().map_err(|e| DecodeError::Read {
                    path: self.path.clone(),
                    details: format!("flush decoder: {}", e),
                })?;
                self.eof_sent = true;
            }
        }
    }
}
