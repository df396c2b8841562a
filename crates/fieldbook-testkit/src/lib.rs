//! # Fieldbook Testkit
//!
//! Testing utilities for Fieldbook.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a seeded [`MemoryStore`](fieldbook_store::MemoryStore)
//!   with helpers for users, family members, reports and locked teams
//! - **Channels**: recording and failing notifier/mailer implementations
//! - **Faults**: a store wrapper that fails directory lookups on demand
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use fieldbook_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let owner = fixture.user("owner").await;
//! let report = fixture.match_report(owner.id, "pressed high").await;
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use fieldbook_core::ShareScope;
//! use fieldbook_testkit::generators::{document_id, scope};
//!
//! proptest! {
//!     #[test]
//!     fn all_scope_covers_everything(scope in scope(), id in document_id()) {
//!         prop_assume!(scope == ShareScope::All);
//!         prop_assert!(scope.covers(&id));
//!     }
//! }
//! ```

pub mod channels;
pub mod faults;
pub mod fixtures;
pub mod generators;

pub use channels::{
    failing_dispatcher, recording_dispatcher, FailingMailer, FailingNotifier, RecordingMailer,
    RecordingNotifier, SlowMailer,
};
pub use faults::FaultyStore;
pub use fixtures::{multi_party_fixture, report_fields, TestFixture};
