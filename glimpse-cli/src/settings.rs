//! Settings for the analysis tool.
//!
//! Maps to `glimpse.toml`. The legacy JSON layout
//! (`{ "model": { "name": ..., "parameters": { "max_new_tokens": ... } } }`)
//! is accepted for files ending in `.json`. A missing file is not an error:
//! the built-in defaults apply.

use std::path::{Path, PathBuf};

use glimpse_client::ClientConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// File consulted when no path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "glimpse.toml";

/// Errors raised while reading a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML settings: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid JSON settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Model selection and generation limits.
    #[serde(default)]
    pub model: ModelSettings,
    /// Transport tuning. Its `model` field is replaced by `model.name`.
    #[serde(default)]
    pub client: ClientConfig,
    /// Where results go.
    #[serde(default)]
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model identifier on the server.
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default)]
    pub parameters: ModelParameters,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            parameters: ModelParameters::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Token bound for per-frame video analysis.
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory for `<name>_analysis.json` files.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
        }
    }
}

impl Settings {
    /// Parse settings from a TOML string.
    ///
    /// # Errors
    /// Returns `SettingsError::Toml` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Parse settings from a JSON string.
    ///
    /// # Errors
    /// Returns `SettingsError::Json` if the JSON is invalid.
    pub fn from_json(json_str: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json_str)?)
    }

    /// Read settings from a file; `.json` files are parsed as JSON, anything
    /// else as TOML.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    /// Load settings, tolerating absence and falling back to defaults on a
    /// broken file.
    #[must_use]
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
        if !path.exists() {
            debug!(path = %path.display(), "no settings file; using defaults");
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(settings) => {
                debug!(path = %path.display(), model = %settings.model.name, "loaded settings");
                settings
            }
            Err(e) => {
                warn!("{e}; using default settings");
                Self::default()
            }
        }
    }

    /// The client configuration these settings describe.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            model: self.model.name.clone(),
            ..self.client.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_model_name() -> String { "qwen3-vl-8b-ctx32k-explicit:latest".to_string() }
fn default_max_new_tokens() -> u32 { 512 }
fn default_results_dir() -> PathBuf { PathBuf::from("results") }
