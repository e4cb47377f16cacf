//! Inference error types.

use thiserror::Error;

/// Errors that can occur while producing an answer.
///
/// Every failure mode of a call is resolved into one of these variants; the
/// client never panics and never leaves a call hanging.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The HTTP server did not answer the liveness probe.
    #[error("HTTP transport unreachable at {url}")]
    ProbeFailed { url: String },

    /// An endpoint answered with a non-success status or the connection failed.
    #[error("endpoint {endpoint} rejected request: {reason}")]
    EndpointRejected { endpoint: String, reason: String },

    /// An attempt did not complete within its bound.
    #[error("{transport} timed out after {after_ms}ms")]
    Timeout { transport: String, after_ms: u64 },

    /// The backend reported success but the body could not be decoded.
    #[error("failed to parse backend response: {detail}: {raw}")]
    ResponseParse { detail: String, raw: String },

    /// The local fallback program is not installed.
    #[error("inference backend not available: HTTP unreachable and `{program}` not found")]
    SubprocessMissing { program: String },

    /// The local fallback program exited unsuccessfully.
    #[error("`{program}` exited with status {}: {stderr}", describe_status(.status))]
    SubprocessFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Every transport in the chain failed.
    #[error("all transports exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// The request itself is unusable.
    #[error("invalid inference request: {0}")]
    InvalidRequest(String),
}

fn describe_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "signal".to_string(), |code| code.to_string())
}

impl InferenceError {
    /// Whether the dispatch chain should move on to the next transport.
    #[must_use]
    pub fn is_fallthrough(&self) -> bool {
        matches!(
            self,
            Self::ProbeFailed { .. } | Self::EndpointRejected { .. } | Self::Timeout { .. }
        )
    }

    pub(crate) fn from_reqwest(endpoint: &str, after_ms: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                transport: endpoint.to_string(),
                after_ms,
            }
        } else {
            Self::EndpointRejected {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallthrough_classification() {
        assert!(
            InferenceError::ProbeFailed {
                url: "http://x".into()
            }
            .is_fallthrough()
        );
        assert!(
            InferenceError::Timeout {
                transport: "chat".into(),
                after_ms: 10
            }
            .is_fallthrough()
        );
        assert!(
            !InferenceError::ResponseParse {
                detail: "eof".into(),
                raw: String::new()
            }
            .is_fallthrough()
        );
        assert!(
            !InferenceError::SubprocessMissing {
                program: "ollama".into()
            }
            .is_fallthrough()
        );
    }

    #[test]
    fn missing_program_mentions_availability() {
        let err = InferenceError::SubprocessMissing {
            program: "ollama".into(),
        };
        assert!(err.to_string().contains("not available"));
    }

    #[test]
    fn failed_program_reports_signal_when_no_code() {
        let err = InferenceError::SubprocessFailed {
            program: "ollama".into(),
            status: None,
            stderr: "killed".into(),
        };
        assert_eq!(err.to_string(), "`ollama` exited with status signal: killed");
    }
}
