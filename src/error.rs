// Error handling module
// Normalized error taxonomy surfaced by the request pipeline

use std::collections::HashMap;

use thiserror::Error;

/// Errors surfaced to callers of the API client.
///
/// Every transport-level failure is converted into one of these shapes
/// before it reaches calling code; raw reqwest/serde errors never escape.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No usable response was received (timeout, connection refused, DNS).
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Authentication is irrecoverably failed: 401/403 after the single
    /// allowed refresh-and-retry, or the refresh itself failed.
    #[error("authentication failed (status {status})")]
    Auth { status: u16 },

    /// Any other non-2xx response, with a message extracted from the body
    /// and field-level validation errors when the server provides them.
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        message: String,
        fields: HashMap<String, Vec<String>>,
    },

    /// Client-side failure (request construction, malformed success body).
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// Classify a reqwest transport error.
    ///
    /// Errors that mean "no complete response arrived" become `Network`;
    /// anything else (builder misuse, redirect policy) is internal.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_body() || err.is_request() {
            ClientError::Network(err)
        } else {
            ClientError::Internal(anyhow::Error::new(err).context("HTTP transport failure"))
        }
    }

    /// True for the taxonomy kind that should send the user back to login.
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth { .. })
    }
}

/// Build an `Api` error from a non-2xx response body.
///
/// The server uses the common REST error shapes: `{"detail": "..."}` for a
/// single message, or an object mapping field names to lists of messages for
/// validation failures. Unparseable bodies fall back to the raw text.
pub fn api_error_from_body(status: u16, body: &str) -> ClientError {
    let mut message = String::new();
    let mut fields: HashMap<String, Vec<String>> = HashMap::new();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(object) = value.as_object() {
            for (key, entry) in object {
                match entry {
                    serde_json::Value::String(s) if key == "detail" || key == "message" => {
                        message = s.clone();
                    }
                    serde_json::Value::Array(items) => {
                        let messages: Vec<String> = items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect();
                        if !messages.is_empty() {
                            fields.insert(key.clone(), messages);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if message.is_empty() {
        if let Some(msgs) = fields.get("non_field_errors") {
            message = msgs.join("; ");
        } else if !fields.is_empty() {
            message = "validation failed".to_string();
        } else {
            let trimmed = body.trim();
            message = if trimmed.is_empty() {
                format!("request failed with status {}", status)
            } else {
                trimmed.chars().take(200).collect()
            };
        }
    }

    ClientError::Api {
        status,
        message,
        fields,
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ClientError::Auth { status: 401 };
        assert_eq!(err.to_string(), "authentication failed (status 401)");

        let err = ClientError::Api {
            status: 404,
            message: "Not found".to_string(),
            fields: HashMap::new(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");
    }

    #[test]
    fn test_detail_body() {
        let err = api_error_from_body(404, r#"{"detail": "No Product matches the given query."}"#);
        match err {
            ClientError::Api {
                status,
                message,
                fields,
            } => {
                assert_eq!(status, 404);
                assert_eq!(message, "No Product matches the given query.");
                assert!(fields.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_field_error_body() {
        let body =
            r#"{"name": ["This field is required."], "price": ["A valid number is required."]}"#;
        let err = api_error_from_body(400, body);
        match err {
            ClientError::Api {
                status,
                message,
                fields,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "validation failed");
                assert_eq!(fields["name"], vec!["This field is required."]);
                assert_eq!(fields["price"], vec!["A valid number is required."]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_field_errors_become_message() {
        let body = r#"{"non_field_errors": ["Unable to log in with provided credentials."]}"#;
        let err = api_error_from_body(400, body);
        match err {
            ClientError::Api { message, .. } => {
                assert_eq!(message, "Unable to log in with provided credentials.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_body_falls_back_to_text() {
        let err = api_error_from_body(502, "Bad Gateway");
        match err {
            ClientError::Api {
                status, message, ..
            } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_body_fallback() {
        let err = api_error_from_body(500, "  ");
        match err {
            ClientError::Api { message, .. } => {
                assert_eq!(message, "request failed with status 500");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_is_auth() {
        assert!(ClientError::Auth { status: 403 }.is_auth());
        assert!(!api_error_from_body(400, "{}").is_auth());
    }
}
