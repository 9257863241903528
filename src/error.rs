// Client-side API error types
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::auth::credentials::CredentialError;

/// Failure of a call against the NextStep backend.
///
/// `Status` carries the server's response untouched, so a 401 that survives
/// the refresh-and-retry cycle reaches the caller exactly as the server sent it.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {}", summarize_body(.body))]
    Status { status: u16, body: Value },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Credential store error: {0}")]
    Credentials(#[from] CredentialError),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field_errors: HashMap<String, String>,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            field_errors: HashMap::new(),
        }
    }

    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), message.clone());
        ApiError::Validation { message, field_errors }
    }

    /// HTTP status when the failure came from a server response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the caller should treat the user as logged out
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }

    /// Error code for machine-readable CLI output
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Status { status, .. } => match status {
                400 => "BAD_REQUEST",
                401 => "UNAUTHORIZED",
                403 => "FORBIDDEN",
                404 => "NOT_FOUND",
                409 => "CONFLICT",
                429 => "TOO_MANY_REQUESTS",
                500..=599 => "SERVER_ERROR",
                _ => "HTTP_ERROR",
            },
            ApiError::Transport(_) => "TRANSPORT_ERROR",
            ApiError::Decode(_) => "DECODE_ERROR",
            ApiError::InvalidUrl(_) => "INVALID_URL",
            ApiError::Credentials(_) => "CREDENTIAL_STORE_ERROR",
            ApiError::Validation { .. } => "VALIDATION_ERROR",
        }
    }

    /// Field errors from a client-side check or a DRF-style 400 body
    /// (`{"password": ["Passwords must match."]}`).
    pub fn field_errors(&self) -> HashMap<String, String> {
        match self {
            ApiError::Validation { field_errors, .. } => field_errors.clone(),
            ApiError::Status { status: 400, body } => body
                .as_object()
                .map(|obj| {
                    obj.iter()
                        .filter_map(|(field, value)| {
                            field_message(value).map(|msg| (field.clone(), msg))
                        })
                        .collect()
                })
                .unwrap_or_default(),
            _ => HashMap::new(),
        }
    }
}

fn field_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            }
        }
        _ => None,
    }
}

fn summarize_body(body: &Value) -> String {
    for key in ["detail", "error", "message"] {
        if let Some(msg) = body.get(key).and_then(Value::as_str) {
            return msg.to_string();
        }
    }
    match body {
        Value::Null => "no response body".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_display_prefers_detail() {
        let err = ApiError::Status {
            status: 401,
            body: json!({"detail": "Given token not valid for any token type"}),
        };
        assert_eq!(err.to_string(), "HTTP 401: Given token not valid for any token type");
        assert!(err.is_unauthorized());
        assert_eq!(err.error_code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_field_errors_from_drf_body() {
        let err = ApiError::Status {
            status: 400,
            body: json!({
                "username": ["A user with that username already exists."],
                "email": "Enter a valid email address.",
                "non_string": 5
            }),
        };
        let fields = err.field_errors();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["username"], "A user with that username already exists.");
        assert_eq!(fields["email"], "Enter a valid email address.");
    }

    #[test]
    fn test_validation_is_not_unauthorized() {
        let err = ApiError::field("password", "Passwords must match.");
        assert!(!err.is_unauthorized());
        assert_eq!(err.status_code(), None);
        assert_eq!(err.field_errors()["password"], "Passwords must match.");
    }
}
