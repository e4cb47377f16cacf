//! Video file frame source using FFmpeg.
//!
//! Frames are decoded sequentially from the first packet; only the frames the
//! sampling window selects are converted to RGB and encoded.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use tracing::{debug, info};

use super::{FrameSource, FrameWindow, SampledFrame, SamplingPlan, encode_png};

pub struct VideoFile {
    path: PathBuf,
}

impl VideoFile {
    /// # Errors
    /// Fails if FFmpeg cannot be initialised.
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl FrameSource for VideoFile {
    fn sample(&mut self, plan: &SamplingPlan) -> Result<Vec<SampledFrame>> {
        let mut input = ffmpeg::format::input(&self.path).with_context(|| {
            format!("failed to open video '{}' with ffmpeg", self.path.display())
        })?;

        let (stream_index, fps, total_frames, mut decoder) = {
            let stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| anyhow::anyhow!("file has no video track"))?;
            let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .context("load video decoder parameters")?;
            let decoder = context
                .decoder()
                .video()
                .context("open ffmpeg video decoder")?;
            (
                stream.index(),
                f64::from(stream.avg_frame_rate()),
                u64::try_from(stream.frames()).ok().filter(|&n| n > 0),
                decoder,
            )
        };
        if !fps.is_finite() || fps <= 0.0 {
            anyhow::bail!("video reports no usable frame rate");
        }

        let window = plan.window(fps, total_frames);
        info!(
            path = %self.path.display(),
            fps,
            total_frames = ?total_frames,
            start = window.start,
            end = ?window.end,
            interval = window.interval,
            "sampling video"
        );

        let mut scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let mut sampler = Sampler {
            window,
            fps,
            next_index: 0,
            frames: Vec::new(),
        };

        let mut finished = false;
        for (stream, packet) in input.packets() {
            if stream.index() != stream_index {
                continue;
            }
            decoder
                .send_packet(&packet)
                .context("send packet to ffmpeg decoder")?;
            if sampler.drain(&mut decoder, &mut scaler)? {
                finished = true;
                break;
            }
        }
        if !finished {
            decoder.send_eof().context("flush ffmpeg decoder")?;
            sampler.drain(&mut decoder, &mut scaler)?;
        }

        debug!(decoded = sampler.next_index, sampled = sampler.frames.len(), "video sampled");
        Ok(sampler.frames)
    }
}

struct Sampler {
    window: FrameWindow,
    fps: f64,
    next_index: u64,
    frames: Vec<SampledFrame>,
}

impl Sampler {
    /// Pull every decoded frame out of the decoder. Returns `true` once the
    /// window's end has been reached.
    #[allow(clippy::cast_precision_loss)]
    fn drain(
        &mut self,
        decoder: &mut ffmpeg::codec::decoder::Video,
        scaler: &mut ffmpeg::software::scaling::context::Context,
    ) -> Result<bool> {
        let mut decoded = ffmpeg::frame::Video::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let index = self.next_index;
            self.next_index += 1;
            if self.window.is_past_end(index) {
                return Ok(true);
            }
            if !self.window.selects(index) {
                continue;
            }

            let mut rgb_frame = ffmpeg::frame::Video::empty();
            scaler
                .run(&decoded, &mut rgb_frame)
                .context("scale frame to RGB")?;
            let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
            self.frames.push(SampledFrame {
                sequence: self.frames.len() + 1,
                frame_index: index,
                timestamp_secs: index as f64 / self.fps,
                png: encode_png(pixels, width, height)?,
            });
        }
        Ok(false)
    }
}

fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data
            .get(..len)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
