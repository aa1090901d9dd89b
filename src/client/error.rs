//! Client error type.

/// Errors surfaced by the session hook and its transport/storage.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server refused the request. The text is the server's, unchanged,
    /// and is meant for end users.
    #[error("{0}")]
    Rejected(String),

    /// Non-success status without a readable error body.
    #[error("Unexpected response (HTTP {status})")]
    UnexpectedResponse { status: u16 },

    /// A success status whose body does not match the contract.
    #[error("Malformed response from session endpoint")]
    MalformedResponse,

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Invalid session data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
