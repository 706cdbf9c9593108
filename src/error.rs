use serde_json::Value;

const FALLBACK_MESSAGE: &str = "Something went wrong.";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unexpected server status: {0}")]
    Server(u16),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Message shown to the user when a view fails.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Network(_) => {
                "Could not complete the request. Check your connection and try again.".to_string()
            }
            ClientError::Unauthorized => "You need to log in to do that.".to_string(),
            ClientError::Forbidden => "You are not permitted to do that.".to_string(),
            ClientError::NotFound => "The requested resource was not found.".to_string(),
            ClientError::Validation(msg) => msg.clone(),
            ClientError::Server(status) => {
                format!("The server could not handle the request (status {status}).")
            }
            ClientError::Decode(_) => {
                "Received an unexpected response from the server.".to_string()
            }
            ClientError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                "Local storage is unavailable.".to_string()
            }
            ClientError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                "Local storage is unavailable.".to_string()
            }
            ClientError::Config(msg) => format!("Invalid configuration: {msg}"),
        }
    }

    /// True for failures that mean "no usable session" rather than a broken request.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ClientError::Unauthorized | ClientError::Forbidden)
    }
}

impl From<rusqlite::Error> for ClientError {
    fn from(err: rusqlite::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<r2d2::Error> for ClientError {
    fn from(err: r2d2::Error) -> Self {
        ClientError::Pool(err.to_string())
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Collapse a validation error body into a single display string.
///
/// A top-level `detail` string wins. Otherwise every field message is
/// concatenated in field-name order, separated by a single space.
pub fn flatten_validation_errors(body: &Value) -> String {
    if let Some(detail) = body.get("detail").and_then(Value::as_str) {
        if !detail.trim().is_empty() {
            return detail.to_string();
        }
    }

    let mut messages = Vec::new();
    collect_messages(body, &mut messages);
    if messages.is_empty() {
        FALLBACK_MESSAGE.to_string()
    } else {
        messages.join(" ")
    }
}

fn collect_messages(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_messages(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_messages(v, out)),
        _ => {}
    }
}
