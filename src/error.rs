use serde_json::Value;
use thiserror::Error;

/// Main error type for PowerSchool API operations
#[derive(Debug, Error)]
pub enum RestError {
    /// The OAuth token exchange failed or returned an `error` field
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Non-success HTTP status whose body carried no server message
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// Failure reported by the server through a `message` field
    #[error("API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    /// Structured rejection of a PowerQuery body, with per-field errors
    #[error("{message}: {errors}")]
    Validation { message: String, errors: Value },

    /// The response decoded as JSON but lacked an expected member
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Paging stopped making progress before reaching the declared count
    #[error("pagination stalled at page {page}: {received} of {expected} records")]
    PaginationStalled {
        page: u32,
        received: usize,
        expected: u64,
    },

    /// Missing or invalid client configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl RestError {
    /// Classify an unsuccessful response body.
    ///
    /// PowerSchool reports failures as `{"message": ..., "errors": ...}`. A
    /// `"Validation Failed"` message is kept apart from other messages so the
    /// caller can inspect the per-field errors.
    pub fn from_body(status: Option<u16>, body: &Value) -> Option<Self> {
        let message = body.get("message")?.as_str()?.to_string();
        if message == "Validation Failed" {
            let errors = body.get("errors").cloned().unwrap_or(Value::Null);
            return Some(RestError::Validation { message, errors });
        }
        Some(RestError::Api { message, status })
    }

    /// Check if this error came from the token exchange
    pub fn is_auth(&self) -> bool {
        matches!(self, RestError::Auth(_))
    }

    /// Check if this error is a structured validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self, RestError::Validation { .. })
    }

    /// Get the HTTP status code if the server provided one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RestError::Api { status, .. } => *status,
            RestError::Http { status, .. } => Some(*status),
            RestError::Reqwest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type for PowerSchool operations
pub type Result<T> = std::result::Result<T, RestError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_failure_is_distinguished() {
        let body = json!({
            "message": "Validation Failed",
            "errors": [{"resource": "student", "field": "dob", "code": "invalid"}]
        });

        let error = RestError::from_body(Some(400), &body).unwrap();
        assert!(error.is_validation());
        match error {
            RestError::Validation { errors, .. } => assert_eq!(errors[0]["field"], "dob"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_generic_message() {
        let body = json!({"message": "Invalid PowerQuery name"});

        let error = RestError::from_body(Some(404), &body).unwrap();
        assert!(!error.is_validation());
        assert_eq!(error.status_code(), Some(404));
        assert_eq!(error.to_string(), "API error: Invalid PowerQuery name");
    }

    #[test]
    fn test_body_without_message() {
        assert!(RestError::from_body(None, &json!({"record": []})).is_none());
        assert!(RestError::from_body(None, &json!({"message": 12})).is_none());
    }
}
