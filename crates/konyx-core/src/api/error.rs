use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of backend errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// HTTP status error (4xx, 5xx)
    HttpStatus,
    /// Request timed out
    Timeout,
    /// Connection refused, DNS failure, or other transport error
    Unreachable,
    /// Response body was not what we expected
    Parse,
    /// No bearer token held; the request was not sent
    NotAuthenticated,
    /// Rejected client-side before any request was made
    Invalid,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::HttpStatus => write!(f, "http_status"),
            ApiErrorKind::Timeout => write!(f, "timeout"),
            ApiErrorKind::Unreachable => write!(f, "unreachable"),
            ApiErrorKind::Parse => write!(f, "parse"),
            ApiErrorKind::NotAuthenticated => write!(f, "not_authenticated"),
            ApiErrorKind::Invalid => write!(f, "invalid"),
        }
    }
}

/// Structured error from the backend with kind and details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// HTTP status when the server answered
    pub status: Option<u16>,
    /// One-line summary suitable for display
    pub message: String,
    /// Raw body or transport error text
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an HTTP status error, lifting the backend's `detail` field
    /// into the message when present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = (!body.is_empty()).then(|| body.to_string());
        let message = match extract_detail(body) {
            Some(detail) => detail,
            None => format!("HTTP {status}"),
        };
        Self {
            kind: ApiErrorKind::HttpStatus,
            status: Some(status),
            message,
            details,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Parse, message)
    }

    pub fn not_authenticated() -> Self {
        Self::new(ApiErrorKind::NotAuthenticated, "Not logged in")
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Invalid, message)
    }

    /// True for 4xx answers.
    pub fn is_client_error(&self) -> bool {
        self.status.is_some_and(|s| (400..500).contains(&s))
    }

    /// True when the server was never reached.
    pub fn is_network(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Timeout | ApiErrorKind::Unreachable)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for backend operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Pulls a readable reason out of a FastAPI-style error body.
///
/// `detail` is either a string or a list of `{msg}` objects; the first
/// message wins.
pub fn extract_detail(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    match json.get("detail")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(Value::as_str))
            .map(str::trim)
            .find(|msg| !msg.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

pub(crate) fn classify_reqwest_error(e: &reqwest::Error) -> ApiError {
    let mut err = if e.is_timeout() {
        ApiError::new(ApiErrorKind::Timeout, format!("Request timed out: {e}"))
    } else if e.is_decode() {
        ApiError::parse(format!("Failed to decode response: {e}"))
    } else if e.is_connect() {
        ApiError::new(ApiErrorKind::Unreachable, format!("Connection failed: {e}"))
    } else {
        ApiError::new(ApiErrorKind::Unreachable, format!("Network error: {e}"))
    };
    err.status = e.status().map(|s| s.as_u16());
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string_becomes_message() {
        let err = ApiError::http_status(401, r#"{"detail":"bad credentials"}"#);
        assert_eq!(err.kind, ApiErrorKind::HttpStatus);
        assert_eq!(err.status, Some(401));
        assert_eq!(err.to_string(), "bad credentials");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_detail_list_uses_first_msg() {
        let body = r#"{"detail":[{"loc":["body","password"],"msg":"field required"},{"msg":"other"}]}"#;
        assert_eq!(extract_detail(body).as_deref(), Some("field required"));
    }

    #[test]
    fn test_no_detail_falls_back_to_status() {
        let err = ApiError::http_status(503, "upstream down");
        assert_eq!(err.to_string(), "HTTP 503");
        assert_eq!(err.details.as_deref(), Some("upstream down"));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_blank_detail_is_ignored() {
        assert_eq!(extract_detail(r#"{"detail":"  "}"#), None);
        assert_eq!(extract_detail(r#"{"detail":[]}"#), None);
    }
}
