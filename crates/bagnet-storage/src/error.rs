use thiserror::Error;

/// Storage daemon adapter errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// The daemon does not know the bag. Removal treats this as success.
    #[error("bag not found")]
    NotFound,

    #[error("daemon returned status {status}: {message}")]
    Api { status: u16, message: String },

    /// The daemon accepted a create request but returned no bag id.
    #[error("empty bag id in create response")]
    EmptyBagId,

    /// `info_loaded` without a merkle hash means the daemon predates the
    /// merkle-aware wire format.
    #[error("storage daemon is too old, please update it")]
    DaemonTooOld,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound)
    }
}

/// Result type for storage daemon calls
pub type Result<T> = std::result::Result<T, StorageError>;
