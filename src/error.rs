//! Client error taxonomy.
//!
//! Every failure surfaced by the backend client or the state stores is a
//! [`ClientError`]. Backend error bodies of the form
//! `{"error": {"code", "message", "details"}}` are normalized into
//! [`ClientError::Http`]; anything unstructured gets a synthesized code.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub const NETWORK_ERROR_MESSAGE: &str = "Network error. Please check your connection.";

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Rejected locally before any request was made.
    #[error("{0}")]
    Validation(String),

    /// No response was received.
    #[error("{0}")]
    Network(String),

    /// Non-2xx response.
    #[error("{message}")]
    Http {
        status: u16,
        code: String,
        message: String,
        details: Option<Value>,
    },

    /// Response or push payload could not be decoded.
    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("{0}")]
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    details: Option<Value>,
}

impl ClientError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Http { code, .. } => code,
            Self::Parse(_) => "PARSE_ERROR",
            Self::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// HTTP status, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Http { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Build an error from a non-2xx response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let payload = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error);

        match payload {
            Some(payload) => Self::Http {
                status,
                code: payload
                    .code
                    .as_ref()
                    .and_then(value_to_text)
                    .unwrap_or_else(|| "API_ERROR".to_string()),
                message: payload
                    .message
                    .as_ref()
                    .and_then(value_to_text)
                    .unwrap_or_else(|| "Request failed.".to_string()),
                details: payload.details,
            },
            None => Self::Http {
                status,
                code: "HTTP_ERROR".to_string(),
                message: format!("Request failed with status {}.", status),
                details: None,
            },
        }
    }

    /// Classify a transport-level `reqwest` failure.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::Network(NETWORK_ERROR_MESSAGE.to_string())
        } else if err.is_body() {
            Self::Network(err.to_string())
        } else {
            Self::Unknown(non_empty(err.to_string()))
        }
    }
}

/// User-facing message for any error, falling back when the error has none.
pub fn describe_error(err: &anyhow::Error, fallback: &str) -> String {
    let message = match err.downcast_ref::<ClientError>() {
        Some(client) => client.to_string(),
        None => err.to_string(),
    };
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn non_empty(message: String) -> String {
    if message.is_empty() {
        "Unexpected error occurred.".to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_body_is_normalized() {
        let err = ClientError::from_response(
            422,
            r#"{"error":{"code":"TASK_TOO_LONG","message":"Task exceeds limit","details":{"max":4000}}}"#,
        );
        assert_eq!(err.code(), "TASK_TOO_LONG");
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.to_string(), "Task exceeds limit");
        assert_eq!(err.details(), Some(&serde_json::json!({"max": 4000})));
    }

    #[test]
    fn structured_body_without_fields_uses_defaults() {
        let err = ClientError::from_response(500, r#"{"error":{}}"#);
        assert_eq!(err.code(), "API_ERROR");
        assert_eq!(err.to_string(), "Request failed.");
    }

    #[test]
    fn unstructured_body_gets_synthesized_code() {
        let err = ClientError::from_response(502, "<html>bad gateway</html>");
        assert_eq!(err.code(), "HTTP_ERROR");
        assert_eq!(err.to_string(), "Request failed with status 502.");
        assert!(err.details().is_none());
    }

    #[test]
    fn numeric_codes_are_stringified() {
        let err = ClientError::from_response(400, r#"{"error":{"code":17,"message":"nope"}}"#);
        assert_eq!(err.code(), "17");
    }

    #[test]
    fn describe_error_falls_back_on_empty_message() {
        let err = anyhow::Error::new(ClientError::Validation(String::new()));
        assert_eq!(describe_error(&err, "fallback"), "fallback");

        let err = anyhow::Error::new(ClientError::Validation("Task cannot be empty.".into()));
        assert_eq!(describe_error(&err, "fallback"), "Task cannot be empty.");
    }
}
