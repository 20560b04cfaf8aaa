use thiserror::Error;

/// Why a chat turn failed.
///
/// Every variant is shown to the user as the same generic message; the
/// distinction only matters for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// The request never produced an HTTP response (DNS, refused, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    /// The backend answered with an `error` field.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ChatError::Status(status.as_u16()),
            None if err.is_decode() => ChatError::Malformed(err.to_string()),
            None => ChatError::Transport(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Malformed(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("could not format message: {0}")]
    Failed(String),
}
