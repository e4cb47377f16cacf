//! Response normalization.
//!
//! Different model/endpoint combinations put the answer in different fields.
//! The extractors below are tried in order against the decoded body; the
//! first non-empty hit wins. Adding a backend field is one line in
//! [`EXTRACTORS`]. When nothing matches, the whole document is returned as
//! JSON text so the model's output is never lost.

use serde_json::Value;

/// A named path into the decoded response body.
pub struct Extractor {
    pub name: &'static str,
    pub path: &'static [&'static str],
}

/// Field precedence, highest first.
pub const EXTRACTORS: &[Extractor] = &[
    Extractor { name: "response", path: &["response"] },
    Extractor { name: "thinking", path: &["thinking"] },
    Extractor { name: "message.content", path: &["message", "content"] },
    Extractor { name: "message.thinking", path: &["message", "thinking"] },
];

impl Extractor {
    /// Pull this field's text out of `body`, if present and non-empty.
    #[must_use]
    pub fn extract(&self, body: &Value) -> Option<String> {
        let value = self
            .path
            .iter()
            .try_fold(body, |node, key| node.as_object()?.get(*key))?;
        as_text(value)
    }
}

/// Reduce a decoded response to a single answer string.
#[must_use]
pub fn normalize(body: &Value) -> String {
    EXTRACTORS
        .iter()
        .find_map(|extractor| {
            extractor.extract(body).inspect(|_| {
                tracing::debug!(field = extractor.name, "answer extracted");
            })
        })
        .unwrap_or_else(|| body.to_string())
}

/// Render a JSON value as answer text; empty values yield `None`.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}
