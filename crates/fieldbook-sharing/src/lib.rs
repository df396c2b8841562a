//! # Fieldbook Sharing
//!
//! Private sharing of documents between users and family members.
//!
//! ## Key Types
//!
//! - [`GrantStore`] - Issues and revokes share grants and email invites
//! - [`AccessResolver`] - Answers "can this principal see this document?"
//! - [`NotificationDispatcher`] - Best-effort in-app and email fan-out
//! - [`SharingConfig`] - Invite lifetime, invite policy, dispatch wait
//!
//! ## Grant Model
//!
//! A grant is either a single document (`scope = one`) or every document of
//! a type owned by the grantor (`scope = all`). `All` is live: documents the
//! owner creates later are covered without another grant.
//!
//! Only owners share. A principal who can see a document because it was
//! shared with them cannot pass it on.
//!
//! ## Side Effects
//!
//! Notification and email delivery never decide the outcome of a grant.
//! Failures come back as [`DispatchWarning`]s next to the successful result.

pub mod access;
pub mod config;
pub mod error;
pub mod grants;
pub mod notify;

pub use access::AccessResolver;
pub use config::{InvitePolicy, SharingConfig, DEFAULT_DISPATCH_WAIT, DEFAULT_INVITE_TTL_MS};
pub use error::{InviteError, Result, SharingError, ALREADY_SHARED_TO_YOU};
pub use grants::{GrantStore, InviteOutcome, ShareListing, ShareOutcome};
pub use notify::{
    Channel, DispatchError, DispatchWarning, GrantEvent, GrantEventKind, LogMailer, LogNotifier,
    Mailer, NotificationDispatcher, Notifier,
};
