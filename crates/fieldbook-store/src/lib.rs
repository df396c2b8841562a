//! # Fieldbook Store
//!
//! Storage abstraction for Fieldbook sharing. Provides a trait-based
//! interface for grants, invites and the directory records sharing reads,
//! with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`StoreExt`] - Idempotent share issuance built on top of [`Store`]
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`Upserted`] - Typed result of an idempotent write: `{inserted, record}`
//! - [`Redeemed`] - An accepted invite and the grant it became
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldbook_store::{SqliteStore, StoreExt};
//!
//! async fn example() {
//!     let store = SqliteStore::open("fieldbook.db").unwrap();
//!
//!     // let outcome = store.upsert_share(identity, now).await.unwrap();
//!     // if outcome.inserted { /* first writer */ }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Uniqueness lives in the store**: single-document shares are unique per
//!   (type, document, recipient) and all-document shares per (type,
//!   recipient). Both are partial unique indexes created by a versioned
//!   migration when the store is opened.
//! - **Duplicate writes are not errors**: [`StoreExt::upsert_share`] turns a
//!   unique-constraint violation into a re-read of the winning row.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Redeemed, Store, StoreExt, Upserted};
