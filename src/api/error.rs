use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single API call.
///
/// `Clone` because one in-flight result is handed to every caller waiting
/// on the same cache key.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
  /// Transport failure; the request may or may not have reached the server
  #[error("network error: {0}")]
  Network(String),

  /// The server answered with an error status
  #[error("HTTP {status}: {}", summarize(.body))]
  Status { status: StatusCode, body: String },

  /// The response body did not match the expected shape
  #[error("failed to decode response: {0}")]
  Decode(String),

  #[error("invalid URL: {0}")]
  InvalidUrl(String),

  /// A cache key was read back as a different type than it was stored
  #[error("cached value for {0} has an unexpected type")]
  CacheType(String),
}

impl ApiError {
  pub fn status(&self) -> Option<StatusCode> {
    match self {
      ApiError::Status { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn is_unauthorized(&self) -> bool {
    self.status() == Some(StatusCode::UNAUTHORIZED)
  }

  pub fn is_not_found(&self) -> bool {
    self.status() == Some(StatusCode::NOT_FOUND)
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      ApiError::Decode(err.to_string())
    } else {
      ApiError::Network(err.to_string())
    }
  }
}

/// The demo backend answers errors with `{"message": "..."}`.
fn summarize(body: &str) -> String {
  serde_json::from_str::<serde_json::Value>(body)
    .ok()
    .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
    .unwrap_or_else(|| body.chars().take(200).collect())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_message_uses_backend_message() {
    let err = ApiError::Status {
      status: StatusCode::BAD_REQUEST,
      body: r#"{"message":"Invalid credentials"}"#.to_string(),
    };
    assert_eq!(err.to_string(), "HTTP 400 Bad Request: Invalid credentials");
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    assert!(!err.is_unauthorized());
  }

  #[test]
  fn test_status_message_falls_back_to_body() {
    let err = ApiError::Status {
      status: StatusCode::UNAUTHORIZED,
      body: "nope".to_string(),
    };
    assert_eq!(err.to_string(), "HTTP 401 Unauthorized: nope");
    assert!(err.is_unauthorized());
  }

  #[test]
  fn test_network_errors_have_no_status() {
    assert_eq!(ApiError::Network("refused".to_string()).status(), None);
  }
}
