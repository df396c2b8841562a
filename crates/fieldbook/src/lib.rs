//! # Fieldbook
//!
//! Private sharing of scouting documents and client-side team lock.
//!
//! ## Overview
//!
//! - **Shares**: an owner grants one document, or every document of a type,
//!   to a user or a family member. Grants are idempotent and safe under
//!   concurrent issuance.
//! - **Invites**: people without an account get an emailed, single-use,
//!   expiring token that turns into a share when accepted.
//! - **Team lock**: a team password is turned into a key on the client. The
//!   server stores only a salt, an iteration count and a verifier, and
//!   serves locked reports as opaque ciphertext.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fieldbook::{FieldbookConfig, ShareService, TeamUnlocker};
//! use fieldbook::store::SqliteStore;
//!
//! async fn example() {
//!     let config = FieldbookConfig::default();
//!     let store = Arc::new(SqliteStore::open("fieldbook.db").unwrap());
//!
//!     // Server side
//!     let service = ShareService::with_logging(store, config.sharing.clone());
//!
//!     // Client side
//!     let unlocker = TeamUnlocker::new(config.lock);
//!     // let security = service.team_security(&team).await?;
//!     // unlocker.unlock(team, &security, "password").await?;
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `fieldbook::core` - Identifiers, share records, report bodies
//! - `fieldbook::lock` - Key derivation, verifier, report cipher
//! - `fieldbook::store` - Storage abstraction and SQLite
//! - `fieldbook::sharing` - Grants, access resolution, notifications

pub mod client;
pub mod config;
pub mod error;
pub mod service;

pub use fieldbook_core as core;
pub use fieldbook_lock as lock;
pub use fieldbook_sharing as sharing;
pub use fieldbook_store as store;

pub use client::TeamUnlocker;
pub use config::{FieldbookConfig, LockConfig};
pub use error::{FieldbookError, Result};
pub use service::{
    AcceptInviteRequest, AcceptInviteResponse, CreateShareRequest, CreateShareResponse,
    DeleteShareResponse, ListSharesQuery, ListSharesResponse, ReportResponse, ShareService,
    TargetRef,
};

pub use fieldbook_core::{
    Document, DocumentId, DocumentType, Principal, PrivateShare, ShareScope, TeamId,
    TeamSecurity, UserId,
};
