use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedcasterError>;

#[derive(Debug, Error)]
pub enum FeedcasterError {
    #[error("Storage error: {0}")]
    Storage(#[from] redb::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Persisted state exists but cannot be trusted.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Missing or malformed configuration. Fatal before any external call.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The credentials belong to a different account than configured.
    #[error("Identity check failed: {0}")]
    Identity(String),

    #[error("{kind} payload too large: {size} bytes (max {limit})")]
    PayloadTooLarge {
        kind: &'static str,
        size: u64,
        limit: u64,
    },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl FeedcasterError {
    /// Configuration and integrity failures halt the run; everything else
    /// degrades a single candidate or batch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FeedcasterError::Integrity(_)
                | FeedcasterError::Config(_)
                | FeedcasterError::Identity(_)
        )
    }
}

/// Failure reported by an external collaborator (posting, upload, lookup).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed: {message} (code {code})")]
pub struct CollaboratorError {
    pub operation: String,
    pub code: String,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(
        operation: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}
