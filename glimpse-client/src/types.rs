//! Core types for inference requests and responses.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Sampling configuration copied into every request.
///
/// Serializes directly into the backend's `options` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    /// Temperature (0.0 = deterministic).
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Nucleus sampling mass.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Candidate pool size.
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Repetition penalty, sent as `presence_penalty`.
    #[serde(default = "default_presence_penalty")]
    pub presence_penalty: f32,
    /// Upper bound on generated tokens, sent as `num_predict`.
    #[serde(
        default,
        rename = "num_predict",
        alias = "max_output_tokens",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_output_tokens: Option<u32>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 20,
            presence_penalty: 1.5,
            max_output_tokens: None,
        }
    }
}

fn default_temperature() -> f32 { 0.7 }
fn default_top_p() -> f32 { 0.8 }
fn default_top_k() -> u32 { 20 }
fn default_presence_penalty() -> f32 { 1.5 }

/// A request as the caller builds it.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Instruction text. Must be non-empty.
    pub prompt: String,
    /// Raw encoded image bytes (PNG, JPEG, ...).
    pub image: Option<Vec<u8>>,
    /// Per-request token bound; wins over the sampling options' value.
    pub max_output_tokens: Option<u32>,
    /// Replaces the client's default sampling options for this call.
    pub sampling: Option<SamplingOptions>,
}

impl InferenceRequest {
    /// Create a text-only request.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            max_output_tokens: None,
            sampling: None,
        }
    }

    /// Attach an image.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<Vec<u8>>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Bound the answer length.
    #[must_use]
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// Override the sampling options.
    #[must_use]
    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = Some(sampling);
        self
    }

    /// Resolve the request against the client's model and defaults.
    #[must_use]
    pub fn prepare(&self, model: &str, defaults: &SamplingOptions) -> PreparedRequest {
        let mut options = self.sampling.clone().unwrap_or_else(|| defaults.clone());
        if self.max_output_tokens.is_some() {
            options.max_output_tokens = self.max_output_tokens;
        }

        PreparedRequest {
            model: model.to_string(),
            prompt: self.prompt.clone(),
            images: self
                .image
                .as_deref()
                .map(|bytes| vec![STANDARD.encode(bytes)])
                .unwrap_or_default(),
            options,
        }
    }
}

/// A request in transport-ready form: model resolved, image base64-encoded.
///
/// Built once per call and shared by every transport attempt.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub model: String,
    pub prompt: String,
    pub images: Vec<String>,
    pub options: SamplingOptions,
}

/// JSON schema accepted by a backend route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointShape {
    /// Message list with one user turn; the image rides on that turn.
    Chat,
    /// Flat prompt with a separate image list.
    Completion,
}

impl EndpointShape {
    /// Route relative to the server's base URL.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Chat => "/api/chat",
            Self::Completion => "/api/generate",
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Completion => "completion",
        }
    }

    /// Build the request body for this shape.
    #[must_use]
    pub fn payload(self, request: &PreparedRequest) -> Value {
        let options = serde_json::to_value(&request.options).unwrap_or_else(|_| json!({}));
        match self {
            Self::Chat => {
                let mut message = json!({
                    "role": "user",
                    "content": request.prompt,
                });
                if !request.images.is_empty() {
                    message["images"] = json!(request.images);
                }
                json!({
                    "model": request.model,
                    "messages": [message],
                    "stream": false,
                    "options": options,
                })
            }
            Self::Completion => {
                let mut body = json!({
                    "model": request.model,
                    "prompt": request.prompt,
                    "stream": false,
                    "options": options,
                });
                if !request.images.is_empty() {
                    body["images"] = json!(request.images);
                }
                body
            }
        }
    }
}

/// The answer to one request.
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    /// The generated text.
    pub text: String,
    /// Name of the transport that produced it.
    pub transport: String,
    /// Wall-clock duration of the whole call in milliseconds.
    pub latency_ms: u64,
}
