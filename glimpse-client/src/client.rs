//! Vision client: dispatches one request across an ordered transport chain.

use std::time::Instant;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::InferenceError;
use crate::transport::{HttpEndpoint, LocalProcess, Transport};
use crate::types::{InferenceRequest, InferenceResponse};

/// The main client. Stateless between calls; safe to share.
pub struct VisionClient {
    config: ClientConfig,
    http: Client,
    transports: Vec<Box<dyn Transport>>,
}

impl VisionClient {
    /// Build the default chain: the configured HTTP endpoints in order, then
    /// the local process fallback if enabled.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let http = Client::new();
        let mut transports: Vec<Box<dyn Transport>> = config
            .endpoints
            .iter()
            .map(|&shape| {
                Box::new(HttpEndpoint::new(
                    http.clone(),
                    config.base(),
                    shape,
                    config.request_timeout(),
                )) as Box<dyn Transport>
            })
            .collect();
        if config.process_fallback {
            transports.push(Box::new(LocalProcess::new(
                config.program.clone(),
                config.process_timeout(),
            )));
        }
        Self {
            config,
            http,
            transports,
        }
    }

    /// Build a client around an explicit transport chain.
    #[must_use]
    pub fn with_transports(config: ClientConfig, transports: Vec<Box<dyn Transport>>) -> Self {
        Self {
            config,
            http: Client::new(),
            transports,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Names of the transports in the order they are tried.
    #[must_use]
    pub fn chain(&self) -> Vec<&str> {
        self.transports.iter().map(|t| t.name()).collect()
    }

    /// Check whether the model server answers at all.
    pub async fn http_available(&self) -> bool {
        self.probe(&format!("{}/", self.config.base())).await
    }

    async fn probe(&self, url: &str) -> bool {
        // Any HTTP response counts; only transport failures mean "down".
        self.http
            .get(url)
            .timeout(self.config.probe_timeout())
            .send()
            .await
            .is_ok()
    }

    /// Produce exactly one answer for `request`.
    ///
    /// Transports are tried in order until one succeeds. An error is returned
    /// when a transport fails terminally or the chain runs out; the call
    /// finishes within [`ClientConfig::worst_case`].
    pub async fn generate(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        if request.prompt.trim().is_empty() {
            return Err(InferenceError::InvalidRequest(
                "prompt must not be empty".into(),
            ));
        }

        let prepared = request.prepare(&self.config.model, &self.config.sampling);
        let started = Instant::now();
        let mut probes: Vec<(&str, bool)> = Vec::new();
        let mut attempts = 0u32;
        let mut last_error = None;

        for transport in &self.transports {
            if let Some(url) = transport.liveness_url() {
                let alive = match probes.iter().find(|(probed, _)| *probed == url) {
                    Some(&(_, alive)) => alive,
                    None => {
                        let alive = self.probe(url).await;
                        if !alive {
                            warn!(url, "liveness probe failed; skipping HTTP transports");
                        }
                        probes.push((url, alive));
                        alive
                    }
                };
                if !alive {
                    last_error = Some(InferenceError::ProbeFailed {
                        url: url.to_string(),
                    });
                    continue;
                }
            }

            attempts += 1;
            match transport.attempt(&prepared).await {
                Ok(text) => {
                    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                    info!(transport = transport.name(), latency_ms, "answer received");
                    return Ok(InferenceResponse {
                        text,
                        transport: transport.name().to_string(),
                        latency_ms,
                    });
                }
                Err(e) if e.is_fallthrough() => {
                    debug!(transport = transport.name(), error = %e, "attempt failed; trying next transport");
                    last_error = Some(e);
                }
                Err(e) => {
                    warn!(transport = transport.name(), error = %e, "attempt failed");
                    return Err(e);
                }
            }
        }

        Err(InferenceError::Exhausted {
            attempts,
            last_error: last_error
                .map_or_else(|| "no transports configured".to_string(), |e| e.to_string()),
        })
    }
}
