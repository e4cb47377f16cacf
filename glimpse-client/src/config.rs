//! Client configuration.
//!
//! One immutable value handed to [`crate::VisionClient`] at construction.
//! Every field has a serde default, so a partial `[client]` table in a
//! settings file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{EndpointShape, SamplingOptions};

/// Inference client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the model server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Liveness probe timeout in milliseconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    /// Per-endpoint HTTP timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Local process fallback timeout in milliseconds.
    #[serde(default = "default_process_timeout")]
    pub process_timeout_ms: u64,
    /// Local fallback program, invoked as `<program> run <model>`.
    #[serde(default = "default_program")]
    pub program: String,
    /// Whether the local process fallback is part of the chain.
    #[serde(default = "default_true")]
    pub process_fallback: bool,
    /// HTTP endpoint shapes in preference order.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<EndpointShape>,
    /// Sampling options applied when a request does not override them.
    #[serde(default)]
    pub sampling: SamplingOptions,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            probe_timeout_ms: default_probe_timeout(),
            request_timeout_ms: default_request_timeout(),
            process_timeout_ms: default_process_timeout(),
            program: default_program(),
            process_fallback: true,
            endpoints: default_endpoints(),
            sampling: SamplingOptions::default(),
        }
    }
}

impl ClientConfig {
    /// Config for `model` with every other field defaulted.
    #[must_use]
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn process_timeout(&self) -> Duration {
        Duration::from_millis(self.process_timeout_ms)
    }

    /// Upper bound on one `generate` call when every transport times out.
    #[must_use]
    pub fn worst_case(&self) -> Duration {
        let http = self.request_timeout() * u32::try_from(self.endpoints.len()).unwrap_or(u32::MAX);
        let process = if self.process_fallback {
            self.process_timeout()
        } else {
            Duration::ZERO
        };
        self.probe_timeout() + http + process
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_model() -> String { "qwen3-vl-8b-ctx32k:latest".to_string() }
fn default_base_url() -> String { "http://127.0.0.1:11434".to_string() }
fn default_program() -> String { "ollama".to_string() }
fn default_probe_timeout() -> u64 { 1_000 }
fn default_request_timeout() -> u64 { 300_000 }
fn default_process_timeout() -> u64 { 60_000 }
fn default_endpoints() -> Vec<EndpointShape> { vec![EndpointShape::Chat, EndpointShape::Completion] }
