//! Error types for the store module.

use fieldbook_core::ShareIdentity;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A write hit a unique index. Resolved by re-reading, never surfaced
    /// past the sharing layer.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A unique index slot is held by a different grant, e.g. another
    /// owner's all-documents grant to the same recipient.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding in-process state was poisoned.
    #[error("store lock poisoned")]
    Poisoned,

    /// The blocking task running a query failed.
    #[error("blocking task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }

    /// The grant for `identity` lost its unique slot to a different grant.
    pub(crate) fn grant_conflict(identity: &ShareIdentity) -> Self {
        StoreError::Conflict(format!(
            "{} already holds a {} grant from another owner",
            identity.shared_with, identity.document_type
        ))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
