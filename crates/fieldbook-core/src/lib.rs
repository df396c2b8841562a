//! # Fieldbook Core
//!
//! Pure types for Fieldbook private sharing: identifiers, share grants,
//! pending invites, team security parameters and report bodies.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is
//! plain data plus the input validation that must run before any store
//! access.
//!
//! ## Key Types
//!
//! - [`PrivateShare`] - A grant making one document (or all documents of a
//!   type) visible to a principal
//! - [`ShareScope`] - `One(DocumentId)` or `All`; the document id exists only
//!   for single-document grants
//! - [`Principal`] - The recipient of a share: a user or a family member
//! - [`PendingPrivateShareInvite`] - An emailed invite for someone without an
//!   account
//! - [`TeamSecurity`] - Public lock parameters (salt, iterations, verifier)
//! - [`EncryptedReportBody`] - Opaque ciphertext attached to a report

pub mod directory;
pub mod error;
pub mod share;
pub mod team;
pub mod types;
pub mod validation;

pub use directory::{Document, FamilyMember, ReportBody, User};
pub use error::ValidationError;
pub use share::{
    AthleteType, DocumentType, PendingPrivateShareInvite, Principal, PrivateShare, ScopeKind,
    ShareIdentity, ShareScope,
};
pub use team::{CryptoEnvelope, EncryptedReportBody, KdfParams, TeamSecurity};
pub use types::{
    now_millis, DocumentId, FamilyMemberId, InviteId, InviteToken, ShareId, TeamId, UserId,
    DAY_MS,
};
pub use validation::{normalize_email, validate_email};
