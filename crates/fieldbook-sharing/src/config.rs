//! Sharing configuration.

use std::time::Duration;

use fieldbook_core::{DocumentType, DAY_MS};

/// Invites expire seven days after they are issued.
pub const DEFAULT_INVITE_TTL_MS: i64 = 7 * DAY_MS;

/// How long a grant call waits for notification delivery before returning.
///
/// Long enough for in-process channels and a local mail relay to report
/// failures as warnings, short enough that a slow backend adds little to
/// the grant call. Channels still running at the deadline finish detached.
pub const DEFAULT_DISPATCH_WAIT: Duration = Duration::from_millis(100);

/// What to do when an owner invites an email that already has a pending
/// invite for the same scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvitePolicy {
    /// Return the pending invite and resend its email.
    #[default]
    ReusePending,
    /// Issue a fresh invite row and token every time.
    AlwaysCreate,
}

/// Configuration for grant issuance.
#[derive(Debug, Clone)]
pub struct SharingConfig {
    /// Lifetime of an emailed invite, in milliseconds.
    pub invite_ttl_ms: i64,
    /// Invite deduplication policy.
    pub invite_policy: InvitePolicy,
    /// Upper bound on waiting for notification channels.
    ///
    /// The grant is committed before dispatch starts, so this only trades
    /// latency for delivery warnings in the response. `Duration::ZERO`
    /// returns immediately and reports no warnings; failures are then only
    /// logged.
    pub dispatch_wait: Duration,
    /// Document types that may be shared at all.
    pub allowed_document_types: Vec<DocumentType>,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            invite_ttl_ms: DEFAULT_INVITE_TTL_MS,
            invite_policy: InvitePolicy::default(),
            dispatch_wait: DEFAULT_DISPATCH_WAIT,
            allowed_document_types: DocumentType::ALL.to_vec(),
        }
    }
}

impl SharingConfig {
    pub fn with_invite_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.invite_ttl_ms = ttl_ms;
        self
    }

    pub fn with_invite_policy(mut self, policy: InvitePolicy) -> Self {
        self.invite_policy = policy;
        self
    }

    pub fn with_dispatch_wait(mut self, wait: Duration) -> Self {
        self.dispatch_wait = wait;
        self
    }

    pub fn with_allowed_document_types(mut self, types: Vec<DocumentType>) -> Self {
        self.allowed_document_types = types;
        self
    }

    pub fn allows(&self, document_type: DocumentType) -> bool {
        self.allowed_document_types.contains(&document_type)
    }
}
