use thiserror::Error;

/// Provider transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway returned status {0}")]
    Status(u16),

    #[error("malformed proof in response: {0}")]
    MalformedProof(String),
}

/// Result type for provider transport calls
pub type Result<T> = std::result::Result<T, TransportError>;
