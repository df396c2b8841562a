//! Error types for the Fieldbook service layer.

use fieldbook_core::ValidationError;
use fieldbook_lock::CryptoError;
use fieldbook_sharing::SharingError;
use fieldbook_store::StoreError;
use thiserror::Error;

/// Errors that can occur in service and client operations.
#[derive(Debug, Error)]
pub enum FieldbookError {
    /// Validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Sharing error.
    #[error(transparent)]
    Sharing(#[from] SharingError),

    /// Key derivation or decryption error.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller may not read the record.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Report is encrypted and its team has not been unlocked this session.
    #[error("team is locked: {0}")]
    Locked(String),

    /// A blocking task failed to complete.
    #[error("task failed: {0}")]
    Task(String),
}

impl FieldbookError {
    /// Stable error code for transports.
    pub fn code(&self) -> &'static str {
        match self {
            FieldbookError::Validation(_) => "validation",
            FieldbookError::Sharing(e) => match e {
                SharingError::Validation(_) => "validation",
                SharingError::Unauthorized(_) => "authorization",
                SharingError::Conflict(_) => "conflict",
                SharingError::NotFound(_) => "not-found",
                SharingError::Invite(_) => "invite",
                SharingError::Store(_) => "internal",
            },
            FieldbookError::Crypto(_) | FieldbookError::Locked(_) => "crypto",
            FieldbookError::NotFound(_) => "not-found",
            FieldbookError::Forbidden(_) => "authorization",
            FieldbookError::Store(_) | FieldbookError::Task(_) => "internal",
        }
    }
}

/// Result type for Fieldbook operations.
pub type Result<T> = std::result::Result<T, FieldbookError>;
