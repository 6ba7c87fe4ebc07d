/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use rollmon_storage::error::StorageError;
///
/// let err = StorageError::from(std::io::Error::other("disk full"));
/// assert!(err.to_string().contains("disk full"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure (list and map columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The database file or its directory could not be created.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
