use thiserror::Error;

/// Fatal run errors. Every variant guarantees the target note was not
/// mutated; non-fatal problems travel as `ParseWarning` values on the
/// successful result instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Generated region structure error: {0}")]
    Merge(#[from] errors::MergeError),

    #[error("Write failed: {0}")]
    Writer(#[from] errors::WriterError),

    #[error("Vault error: {0}")]
    Vault(#[from] errors::VaultError),

    #[error("Date filter rejected: {0}")]
    Filter(#[from] errors::FilterError),

    #[error("A synchronization run is already in flight for {path}")]
    RunInProgress { path: String },

    #[error("Run cancelled before writing began")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
