//! Transport strategies: one per way of reaching the model.
//!
//! [`crate::VisionClient`] holds an ordered list of these and tries them in
//! turn, stopping at the first success.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::InferenceError;
use crate::extract;
use crate::types::{EndpointShape, PreparedRequest};

/// Raw bodies quoted in errors and logs are cut to this many characters.
pub const RAW_EXCERPT_CHARS: usize = 500;

/// One way of delivering a request to the inference backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name used in logs and responses.
    fn name(&self) -> &str;

    /// URL whose reachability gates this transport, if any.
    ///
    /// The client probes each distinct URL once per call and skips every
    /// transport gated on an unreachable one.
    fn liveness_url(&self) -> Option<&str> {
        None
    }

    /// Make one attempt. Errors for which
    /// [`InferenceError::is_fallthrough`] holds hand over to the next transport.
    async fn attempt(&self, request: &PreparedRequest) -> Result<String, InferenceError>;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// A JSON endpoint on the model server.
pub struct HttpEndpoint {
    shape: EndpointShape,
    url: String,
    probe_url: String,
    http: Client,
    timeout: Duration,
}

impl HttpEndpoint {
    #[must_use]
    pub fn new(http: Client, base_url: &str, shape: EndpointShape, timeout: Duration) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            shape,
            url: format!("{base}{}", shape.path()),
            probe_url: format!("{base}/"),
            http,
            timeout,
        }
    }

    #[must_use]
    pub fn shape(&self) -> EndpointShape {
        self.shape
    }
}

#[async_trait]
impl Transport for HttpEndpoint {
    fn name(&self) -> &str {
        self.shape.name()
    }

    fn liveness_url(&self) -> Option<&str> {
        Some(&self.probe_url)
    }

    async fn attempt(&self, request: &PreparedRequest) -> Result<String, InferenceError> {
        let body = self.shape.payload(request);
        if tracing::enabled!(tracing::Level::DEBUG) {
            let keys: Vec<&str> = body
                .as_object()
                .map(|map| map.keys().map(String::as_str).collect())
                .unwrap_or_default();
            let image_b64_len: usize = request.images.iter().map(String::len).sum();
            debug!(url = %self.url, ?keys, image_b64_len, "POST");
        }

        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| InferenceError::from_reqwest(self.name(), timeout_ms, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            warn!(endpoint = self.name(), %status, "endpoint rejected request");
            return Err(InferenceError::EndpointRejected {
                endpoint: self.name().to_string(),
                reason: format!("HTTP {status}: {}", excerpt(&text)),
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| InferenceError::from_reqwest(self.name(), timeout_ms, e))?;
        debug!(endpoint = self.name(), %status, body = %excerpt(&raw), "response received");

        let json: Value = serde_json::from_str(&raw).map_err(|e| InferenceError::ResponseParse {
            detail: e.to_string(),
            raw: excerpt(&raw),
        })?;
        if let Some(map) = json.as_object() {
            debug!(keys = ?map.keys().collect::<Vec<_>>(), "response fields");
        }
        Ok(extract::normalize(&json))
    }
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(RAW_EXCERPT_CHARS).collect()
}

// ---------------------------------------------------------------------------
// Local process
// ---------------------------------------------------------------------------

/// Runs `<program> run <model>` with the prompt on stdin and takes stdout as
/// the answer. The child is killed if the timeout elapses.
pub struct LocalProcess {
    program: String,
    timeout: Duration,
}

impl LocalProcess {
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn failed(&self, status: Option<i32>, stderr: impl Into<String>) -> InferenceError {
        InferenceError::SubprocessFailed {
            program: self.program.clone(),
            status,
            stderr: stderr.into(),
        }
    }
}

#[async_trait]
impl Transport for LocalProcess {
    fn name(&self) -> &str {
        "process"
    }

    async fn attempt(&self, request: &PreparedRequest) -> Result<String, InferenceError> {
        if !request.images.is_empty() {
            warn!(program = %self.program, "local process fallback cannot take images; sending prompt only");
        }
        debug!(program = %self.program, model = %request.model, "spawning local inference");

        let mut child = match Command::new(&self.program)
            .arg("run")
            .arg(&request.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(InferenceError::SubprocessMissing {
                    program: self.program.clone(),
                });
            }
            Err(e) => return Err(self.failed(None, e.to_string())),
        };

        // Feed stdin from its own task so a chatty child cannot deadlock us.
        if let Some(mut stdin) = child.stdin.take() {
            let prompt = request.prompt.clone().into_bytes();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&prompt).await {
                    debug!("prompt not fully written to child: {e}");
                }
            });
        }

        let started = Instant::now();
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(self.failed(None, e.to_string())),
            Err(_) => {
                warn!(program = %self.program, "local inference timed out");
                return Err(InferenceError::Timeout {
                    transport: self.program.clone(),
                    after_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        if !output.status.success() {
            return Err(self.failed(
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        let answer = String::from_utf8_lossy(&output.stdout).into_owned();
        if answer.trim().is_empty() {
            return Err(self.failed(output.status.code(), "produced no output"));
        }
        Ok(answer)
    }
}
