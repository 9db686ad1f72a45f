//! Sequential video decoding with fixed-stride frame sampling.

#[cfg(feature = "ffmpeg")]
mod ffmpeg;


#[cfg(feature = "ffmpeg")]
pub use ffmpeg::{FfmpegFrameSource, FfmpegVideoOpener};

use crate::error::{DecodeError, Result};
use crate::frame::FrameData;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Infer on every 15th frame, roughly twice a second for typical camera footage
pub const DEFAULT_FRAME_STRIDE: u64 = 15;

/// A decoder that yields every frame of one video in order
pub trait FrameSource {
    /// Decode the next frame; `Ok(None)` at end of stream
    fn next_frame(&mut self) -> std::result::Result<Option<FrameData>, DecodeError>;
}

/// Opens video files for decoding
pub trait VideoOpener: Send + Sync {
    fn open(&self, path: &Path) -> std::result::Result<Box<dyn FrameSource>, DecodeError>;
}

/// The decoder compiled into this build
pub fn default_opener() -> Result<Arc<dyn VideoOpener>> {
    #[cfg(feature = "ffmpeg")]
    {
        Ok(Arc::new(FfmpegVideoOpener::new()?))
    }

    #[cfg(not(feature = "ffmpeg"))]
    {
        Err(crate::error::CctvError::config(
            "cctv-filter was built without a video decoder; rebuild with \
             `cargo build --release --features ffmpeg` (needs the FFmpeg development libraries)",
        ))
    }
}

/// Lazily decodes every frame of a source and yields every `stride`th one,
/// starting with the first.
///
/// The sequence ends at end of stream or at the first read error; a source
/// that fails immediately yields nothing. Not restartable.
pub struct FrameSampler<S> {
    source: S,
    stride: u64,
    decoded: u64,
    next_sample: u64,
    finished: bool,
    read_error: Option<DecodeError>,
}

impl<S: FrameSource> FrameSampler<S> {
    pub fn new(source: S, stride: u64) -> Self {
        Self {
            source,
            stride: stride.max(1),
            decoded: 0,
            next_sample: 1,
            finished: false,
            read_error: None,
        }
    }

    /// Number of frames decoded so far, sampled or not
    pub fn decoded_frames(&self) -> u64 {
        self.decoded
    }

    /// The error that ended the sequence early, if any
    pub fn read_error(&self) -> Option<&DecodeError> {
        self.read_error.as_ref()
    }
}

impl<S: FrameSource> Iterator for FrameSampler<S> {
    type Item = FrameData;

    fn next(&mut self) -> Option<FrameData> {
        while !self.finished {
            match self.source.next_frame() {
                Ok(Some(mut frame)) => {
                    self.decoded += 1;
                    if self.decoded == self.next_sample {
                        self.next_sample += self.stride;
                        frame.index = self.decoded;
                        return Some(frame);
                    }
                }
                Ok(None) => {
                    debug!("End of stream after {} frames", self.decoded);
                    self.finished = true;
                }
                Err(e) => {
                    if self.decoded == 0 {
                        warn!("Unable to read any frame: {}", e);
                    } else {
                        warn!("Decoding stopped after {} frames: {}", self.decoded, e);
                    }
                    self.read_error = Some(e);
                    self.finished = true;
                }
            }
        }
        None
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> std::result::Result<Option<FrameData>, DecodeError> {
        (**self).next_frame()
    }
}
