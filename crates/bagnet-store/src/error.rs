use thiserror::Error;

/// Store error types
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(String),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
