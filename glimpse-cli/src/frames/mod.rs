//! Frame sources.
//!
//! Video is sampled uniformly by frame index: starting at the first frame at
//! or after `start`, every `interval`-th frame is kept until `end` (or the end
//! of the stream). Sampled frames are handed on as in-memory PNGs.

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};

#[cfg(feature = "video")]
mod video;

#[cfg(feature = "video")]
pub use video::VideoFile;

/// What to sample from a video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPlan {
    /// Keep every `interval`-th frame. At least 1.
    pub interval: u32,
    /// Start offset in seconds.
    pub start_secs: f64,
    /// End offset in seconds; `None` runs to the end of the stream.
    pub end_secs: Option<f64>,
}

impl Default for SamplingPlan {
    fn default() -> Self {
        Self {
            interval: 30,
            start_secs: 0.0,
            end_secs: None,
        }
    }
}

impl SamplingPlan {
    #[must_use]
    pub fn every(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn between(mut self, start_secs: f64, end_secs: Option<f64>) -> Self {
        self.start_secs = start_secs.max(0.0);
        self.end_secs = end_secs;
        self
    }

    /// Resolve the plan against a stream's frame rate and length.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn window(&self, fps: f64, total_frames: Option<u64>) -> FrameWindow {
        let to_frame = |secs: f64| (secs * fps).floor().max(0.0) as u64;
        FrameWindow {
            start: to_frame(self.start_secs),
            end: self.end_secs.map(to_frame).or(total_frames),
            interval: u64::from(self.interval.max(1)),
        }
    }
}

/// A plan resolved to frame indices: `start <= i < end`, stepping by `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    pub start: u64,
    pub end: Option<u64>,
    pub interval: u64,
}

impl FrameWindow {
    #[must_use]
    pub fn selects(&self, index: u64) -> bool {
        index >= self.start && !self.is_past_end(index) && (index - self.start) % self.interval == 0
    }

    #[must_use]
    pub fn is_past_end(&self, index: u64) -> bool {
        self.end.is_some_and(|end| index >= end)
    }

    /// Selected indices, when the window is bounded.
    pub fn indices(&self) -> Option<impl Iterator<Item = u64>> {
        let end = self.end?;
        let step = usize::try_from(self.interval).unwrap_or(usize::MAX);
        Some((self.start..end).step_by(step))
    }
}

/// One still taken from a video.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// 1-based position among the sampled frames.
    pub sequence: usize,
    /// Index of the frame in the stream.
    pub frame_index: u64,
    /// Presentation time in seconds.
    pub timestamp_secs: f64,
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
}

/// Something that yields sampled stills.
pub trait FrameSource {
    /// Decode and return every frame the plan selects, in stream order.
    ///
    /// # Errors
    /// Returns an error if the source cannot be decoded.
    fn sample(&mut self, plan: &SamplingPlan) -> Result<Vec<SampledFrame>>;
}

/// Open a video file as a frame source.
///
/// # Errors
/// Fails when the file cannot be opened.
#[cfg(feature = "video")]
pub fn open_video(path: &Path) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(VideoFile::open(path)?))
}

/// Open a video file as a frame source.
///
/// # Errors
/// Always fails: this build has no video decoder.
#[cfg(not(feature = "video"))]
pub fn open_video(path: &Path) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!(
        "cannot decode {}: glimpse was built without the `video` feature",
        path.display()
    )
}

/// Encode packed RGB24 pixels as PNG.
///
/// # Errors
/// Fails if the buffer does not match the dimensions.
pub fn encode_png(pixels: Vec<u8>, width: u32, height: u32) -> Result<Vec<u8>> {
    let image = image::RgbImage::from_raw(width, height, pixels)
        .context("pixel buffer does not match frame dimensions")?;
    let mut png = Cursor::new(Vec::new());
    image
        .write_to(&mut png, image::ImageFormat::Png)
        .context("encode frame as PNG")?;
    Ok(png.into_inner())
}

/// Parse `mm:ss` or plain seconds.
///
/// # Errors
/// Returns a message suitable for clap when the text is not a time.
pub fn parse_timecode(text: &str) -> Result<u64, String> {
    let invalid = || format!("invalid time '{text}': expected mm:ss or seconds");
    match text.trim().split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
            let seconds: u64 = seconds.parse().map_err(|_| invalid())?;
            Ok(minutes * 60 + seconds)
        }
        None => text.trim().parse().map_err(|_| invalid()),
    }
}
