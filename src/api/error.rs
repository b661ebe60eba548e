//! Errors surfaced by the remote API.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
  /// Request never produced a response (DNS, connect, timeout...)
  #[error("Network error: {0}")]
  Network(String),

  /// Server answered with a non-success status
  #[error("{message}")]
  Rejected { status: u16, message: String },

  /// Response body did not match the expected shape
  #[error("Invalid response: {0}")]
  Decode(String),
}

impl ApiError {
  pub fn rejected(status: StatusCode, body: &str) -> Self {
    Self::Rejected {
      status: status.as_u16(),
      message: rejection_message(status, body),
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      Self::Decode(e.to_string())
    } else {
      Self::Network(e.to_string())
    }
  }
}

#[derive(Deserialize)]
struct ErrorBody {
  message: Option<String>,
  error: Option<String>,
}

/// Human-readable reason for a rejected request.
///
/// Prefers the `message` (then `error`) field of a JSON body, then a short
/// plain-text body, then the status' canonical reason.
fn rejection_message(status: StatusCode, body: &str) -> String {
  if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
    if let Some(msg) = parsed.message.or(parsed.error) {
      return msg;
    }
  }

  let body = body.trim();
  if !body.is_empty() && body.len() <= 200 && !body.starts_with('<') {
    return body.to_string();
  }

  status
    .canonical_reason()
    .map(String::from)
    .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
