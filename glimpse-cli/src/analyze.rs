//! Analysis pipeline: one inference call per image or sampled frame.
//!
//! Calls are strictly sequential. A failed frame is recorded with its error
//! and the run moves on.

use std::path::Path;

use anyhow::{Context, Result};
use glimpse_client::{InferenceRequest, VisionClient};
use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::frames::SampledFrame;
use crate::report::{FrameRecord, ImageRecord};

/// Analyse a single image file.
///
/// # Errors
/// Fails if the file is unreadable, is not an image, or the model produced
/// no answer.
pub async fn analyze_image(
    client: &VisionClient,
    path: &Path,
    prompt: &str,
    max_output_tokens: u32,
) -> Result<ImageRecord> {
    let bytes = std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
    let format = image::guess_format(&bytes)
        .with_context(|| format!("{} is not a recognised image", path.display()))?;
    info!(path = %path.display(), ?format, bytes = bytes.len(), "analysing image");

    let request = InferenceRequest::new(prompt)
        .with_image(bytes)
        .with_max_output_tokens(max_output_tokens);
    let response = client.generate(&request).await?;

    Ok(ImageRecord {
        image: path.display().to_string(),
        model: client.model().to_string(),
        analysis: response.text,
    })
}

/// Runs the frame prompt over a sequence of sampled frames.
pub struct FrameAnalyzer<'a> {
    client: &'a VisionClient,
    prompt: String,
    max_output_tokens: u32,
}

impl<'a> FrameAnalyzer<'a> {
    #[must_use]
    pub fn new(client: &'a VisionClient, prompt: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            client,
            prompt: prompt.into(),
            max_output_tokens,
        }
    }

    /// Analyse every frame in order, one record per frame.
    pub async fn analyze(&self, frames: Vec<SampledFrame>, progress: &ProgressBar) -> Vec<FrameRecord> {
        progress.set_length(frames.len() as u64);
        let mut records = Vec::with_capacity(frames.len());

        for frame in frames {
            let request = InferenceRequest::new(self.prompt.as_str())
                .with_image(frame.png)
                .with_max_output_tokens(self.max_output_tokens);
            let outcome = self.client.generate(&request).await.map(|r| r.text);
            if let Err(e) = &outcome {
                warn!(frame = frame.sequence, error = %e, "frame analysis failed");
            }
            records.push(FrameRecord::new(frame.sequence, frame.timestamp_secs, outcome));
            progress.inc(1);
        }

        progress.finish_and_clear();
        records
    }
}
