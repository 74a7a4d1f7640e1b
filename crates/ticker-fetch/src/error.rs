use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The request contained a symbol retrieval never accepts.
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    /// The source answered, but reported an error for the whole request.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The document did not have the shape the source promises.
    #[error("unexpected data: {0}")]
    UnexpectedData(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status error: {status} {body}")]
    HttpStatus {
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal: {0}")]
    Internal(String),
}

impl FetchError {
    pub fn http_status(
        status: reqwest::StatusCode,
        body: String,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::HttpStatus {
            status: status.as_u16(),
            body,
            retry_after,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Renders an upstream `error` field, which is either a plain string or an
/// object carrying a `description`.
pub(crate) fn upstream_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("description").and_then(Value::as_str) {
            Some(description) => description.to_string(),
            None => error.to_string(),
        },
        other => other.to_string(),
    }
}
