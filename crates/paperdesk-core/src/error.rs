//! Gateway error type and backend error-body normalization.
//!
//! Every failed call is reduced to one human-readable message. The message is
//! taken from the backend's `detail` field when present, else from the
//! transport layer, else a generic fallback.

use serde_json::Value;
use thiserror::Error;

/// Message used when neither the backend nor the transport says anything useful.
pub const FALLBACK_MESSAGE: &str = "Request failed";

/// A failed backend call. `Display` is exactly the normalized message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Backend { status: u16, message: String },
    /// No usable response (connect failure, timeout, TLS, ...).
    #[error("{0}")]
    Transport(String),
    /// A success response whose body did not match the expected payload.
    #[error("{0}")]
    Decode(String),
}

impl ApiError {
    /// The normalized human-readable message.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Backend { message, .. } => message,
            ApiError::Transport(msg) | ApiError::Decode(msg) => msg,
        }
    }

    /// HTTP status, if the backend responded at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        let msg = e.to_string();
        if msg.trim().is_empty() {
            ApiError::Transport(FALLBACK_MESSAGE.to_string())
        } else {
            ApiError::Transport(msg)
        }
    }
}

/// Build the error for a non-success response from its status and raw body.
pub fn failure_from_body(status: u16, body: &[u8]) -> ApiError {
    let detail = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| detail_message(&v));

    let message = detail.unwrap_or_else(|| format!("Request failed with status code {}", status));
    ApiError::Backend { status, message }
}

/// Extract the `detail` field of an error body as text.
///
/// Structured details are flattened: an object yields its `message`, then its
/// `error`, then its JSON text; arrays (validation error lists) yield their
/// JSON text. Empty or null details count as absent.
pub fn detail_message(body: &Value) -> Option<String> {
    let detail = body.get("detail")?;
    match detail {
        Value::Object(map) => Some(
            map.get("message")
                .and_then(present_text)
                .or_else(|| map.get("error").and_then(present_text))
                .unwrap_or_else(|| detail.to_string()),
        ),
        Value::Array(_) => Some(detail.to_string()),
        other => present_text(other),
    }
}

/// Text of a JSON value, or `None` for null/false/empty/zero.
fn present_text(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}
