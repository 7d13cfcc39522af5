use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised by the chat backend client and the session controllers.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The HTTP exchange completed with a non-success status.
    #[error("request to {endpoint} failed with HTTP status {status}")]
    Transport { endpoint: String, status: StatusCode },

    /// The envelope carried a non-success code; holds the server's message.
    #[error("{0}")]
    Application(String),

    /// The direct-to-storage upload was rejected.
    #[error("upload failed with HTTP status {0}")]
    Upload(StatusCode),

    /// Input refused before any network traffic.
    #[error("{0}")]
    Validation(String),

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ChatResult<T> = Result<T, ChatError>;
