//! Error types for Fieldbook core.

use thiserror::Error;

/// Malformed input, rejected before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid email address")]
    InvalidEmail,

    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("document type {0} cannot be shared")]
    DocumentTypeNotAllowed(String),

    #[error("unknown share scope: {0}")]
    UnknownScope(String),

    #[error("scope \"one\" requires a document id")]
    MissingDocumentId,

    #[error("scope \"all\" must not carry a document id")]
    UnexpectedDocumentId,

    #[error("unknown athlete type: {0}")]
    UnknownAthleteType(String),

    #[error("invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },

    #[error("share request needs exactly one of target or email")]
    AmbiguousTarget,

    #[error("target does not exist")]
    UnknownTarget,

    #[error("invalid invite token")]
    InvalidToken,
}
