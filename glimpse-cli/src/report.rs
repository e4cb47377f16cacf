//! Result records and their JSON persistence.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glimpse_client::InferenceError;
use serde::{Deserialize, Serialize};

/// Analysis of one sampled video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// 1-based position among the sampled frames.
    pub frame_number: usize,
    /// Seconds from the start of the video, two decimals.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    /// Why the frame has no analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameRecord {
    #[must_use]
    pub fn new(frame_number: usize, timestamp_secs: f64, outcome: Result<String, InferenceError>) -> Self {
        let (analysis, error) = match outcome {
            Ok(text) => (Some(text), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            frame_number,
            timestamp: round_centis(timestamp_secs),
            analysis,
            error,
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.analysis.is_some()
    }
}

/// Analysis of one image file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Path of the analysed image as given.
    pub image: String,
    /// Model that produced the analysis.
    pub model: String,
    pub analysis: String,
}

/// Round to two decimal places.
#[must_use]
pub fn round_centis(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

/// `<results_dir>/<source stem>_analysis.json`
#[must_use]
pub fn default_output_path(results_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy());
    results_dir.join(format!("{stem}_analysis.json"))
}

/// Write `value` as pretty JSON, creating parent directories.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create results directory {}", parent.display()))?;
    }
    let data = serde_json::to_vec_pretty(value).context("encode results")?;
    std::fs::write(path, data).with_context(|| format!("write results to {}", path.display()))
}
