//! Error types for sharing operations.

use fieldbook_core::ValidationError;
use fieldbook_store::StoreError;
use thiserror::Error;

/// Conflict reason returned when a recipient tries to re-share a document.
pub const ALREADY_SHARED_TO_YOU: &str = "already-shared-to-you";

/// Errors that can occur while issuing, revoking or accepting grants.
#[derive(Debug, Error)]
pub enum SharingError {
    /// Malformed input. Raised before any store access.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The caller does not own what they are trying to share or revoke.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The request conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Document not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invite token could not be used.
    #[error("invite error: {0}")]
    Invite(#[from] InviteError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl SharingError {
    pub fn already_shared_to_you() -> Self {
        SharingError::Conflict(ALREADY_SHARED_TO_YOU.to_string())
    }

    /// Lift a store conflict on a grant write into [`SharingError::Conflict`].
    pub(crate) fn from_grant_write(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(reason) => SharingError::Conflict(reason),
            other => SharingError::Store(other),
        }
    }
}

/// Why an invite token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InviteError {
    #[error("unknown invite token")]
    Unknown,

    #[error("invite expired")]
    Expired,

    #[error("invite already accepted")]
    AlreadyAccepted,
}

/// Result type for sharing operations.
pub type Result<T> = std::result::Result<T, SharingError>;
