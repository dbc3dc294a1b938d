//! Errors from the remote API layer.

/// Shown when the API answers with an HTML document, which almost
/// always means the base URL points at a web server or proxy instead of
/// the API.
pub const HTML_RESPONSE_MESSAGE: &str =
    "API returned HTML instead of JSON. Check the API URL configuration.";

/// Errors from the remote API gateway.
///
/// Cloneable so that one failed fetch can be handed to every waiter that
/// coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, connect, TLS, reset).
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The transport deadline elapsed.
    #[error("Request timed out")]
    Timeout,

    /// The API answered with a non-2xx status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// `detail` from the error body, or the raw body.
        message: String,
    },

    /// The API answered 404.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The body was markup rather than JSON.
    #[error("{}", HTML_RESPONSE_MESSAGE)]
    HtmlResponse,

    /// The body was JSON of an unexpected shape.
    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }

    /// Build the error for a non-2xx response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = detail(body).unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("HTTP {status}")
            } else {
                trimmed.to_string()
            }
        });

        if status == 404 {
            ApiError::NotFound(message)
        } else {
            ApiError::Api { status, message }
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Extract the human-readable `detail` from an error body.
///
/// The API reports errors as `{"detail": "..."}`; request validation
/// failures carry a list of `{"msg": "..."}` objects instead.
pub fn detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
