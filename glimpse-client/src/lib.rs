//! # glimpse-client: Inference Client for Local Vision-Language Models
//!
//! Turns a prompt plus an optional image into exactly one answer from a
//! locally hosted model server. The backend is unreliable and variably
//! shaped, so every call walks an ordered chain of transports:
//!   - **HTTP chat** (`/api/chat`, one user turn with the image attached)
//!   - **HTTP completion** (`/api/generate`, flat prompt + image list)
//!   - **Local process** (`ollama run <model>`, prompt on stdin)
//!
//! The first success wins. HTTP transports are skipped entirely when a short
//! liveness probe fails. Every attempt carries its own timeout, so a call
//! always finishes in bounded time.
//!
//! # Architecture
//!
//! ```text
//! InferenceRequest ──► VisionClient::generate
//!                         │  probe(base_url)  [~1s]
//!                         ├─► HttpEndpoint(Chat)        ──┐
//!                         ├─► HttpEndpoint(Completion)  ──┼─► extract::normalize ──► text
//!                         └─► LocalProcess(ollama run)  ──┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod transport;
pub mod types;

pub use client::VisionClient;
pub use config::ClientConfig;
pub use error::InferenceError;
pub use transport::{HttpEndpoint, LocalProcess, Transport};
pub use types::{EndpointShape, InferenceRequest, InferenceResponse, PreparedRequest, SamplingOptions};
