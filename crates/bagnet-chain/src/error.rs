use thiserror::Error;

/// Chain reader errors
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("contract state request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("contract state endpoint returned status {0}")]
    Status(u16),

    #[error("retries exhausted for contract {contract}: {last_error}")]
    RetriesExhausted { contract: String, last_error: String },
}

/// Result type for chain reads
pub type Result<T> = std::result::Result<T, ChainError>;
