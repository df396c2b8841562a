//! Store trait: the abstract interface for sharing persistence.
//!
//! This trait allows sharing to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use fieldbook_core::{
    Document, DocumentId, DocumentType, FamilyMember, FamilyMemberId, InviteToken,
    PendingPrivateShareInvite, Principal, PrivateShare, ShareId, ShareIdentity, ShareScope,
    TeamId, TeamSecurity, User, UserId,
};

use crate::error::{Result, StoreError};

/// Result of an idempotent write.
///
/// `inserted` is true only for the caller whose write created the record.
/// Every concurrent caller gets the same `record`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted<T> {
    pub inserted: bool,
    pub record: T,
}

impl<T> Upserted<T> {
    pub fn inserted(record: T) -> Self {
        Self {
            inserted: true,
            record,
        }
    }

    pub fn existing(record: T) -> Self {
        Self {
            inserted: false,
            record,
        }
    }
}

/// An invite accepted together with the grant it became.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redeemed {
    /// The invite, with `accepted_at` set.
    pub invite: PendingPrivateShareInvite,
    pub share: Upserted<PrivateShare>,
}

/// The Store trait: async interface for sharing persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Uniqueness**: a single-document share is unique per
///   (document type, document, recipient); an all-documents share is unique
///   per (document type, recipient), whoever the owner. A violating insert
///   fails with [`StoreError::UniqueViolation`] and writes nothing.
/// - **One-shot invites**: [`Store::redeem_invite`] consumes the token and
///   writes the grant in one atomic step, so a token is accepted at most
///   once and never without its grant.
/// - **Directory records** (users, family members, documents, team lock
///   parameters) are owned elsewhere. The `put_*` methods exist for seeding.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Share Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new share.
    ///
    /// # Returns
    /// - `Ok(())` if the share was inserted.
    /// - `Err(StoreError::UniqueViolation)` if an equivalent grant exists.
    async fn insert_share(&self, share: &PrivateShare) -> Result<()>;

    /// Find the share matching an identity tuple exactly.
    async fn find_share(&self, identity: &ShareIdentity) -> Result<Option<PrivateShare>>;

    /// Get a share by id.
    async fn get_share(&self, id: &ShareId) -> Result<Option<PrivateShare>>;

    /// Delete a share by id. Returns whether a row was removed.
    async fn delete_share(&self, id: &ShareId) -> Result<bool>;

    /// Shares issued by `owner` for a document type and exact scope,
    /// oldest first.
    async fn shares_for_owner(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
    ) -> Result<Vec<PrivateShare>>;

    /// Every share of a document type whose recipient is `principal`.
    async fn shares_for_principal(
        &self,
        principal: &Principal,
        document_type: DocumentType,
    ) -> Result<Vec<PrivateShare>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Invite Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a new invite.
    async fn insert_invite(&self, invite: &PendingPrivateShareInvite) -> Result<()>;

    /// Most recent unaccepted, unexpired invite for (owner, type, scope, email).
    ///
    /// Email comparison is case-insensitive.
    async fn find_pending_invite(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
        email: &str,
        now: i64,
    ) -> Result<Option<PendingPrivateShareInvite>>;

    /// Unaccepted, unexpired invites for an owner's scope, oldest first.
    async fn pending_invites(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
        now: i64,
    ) -> Result<Vec<PendingPrivateShareInvite>>;

    /// Look an invite up by token, whatever its state.
    async fn get_invite_by_token(
        &self,
        token: &InviteToken,
    ) -> Result<Option<PendingPrivateShareInvite>>;

    /// Mark the invite accepted and grant its scope to `recipient`.
    ///
    /// Both writes happen or neither does. Returns `None`, writing nothing,
    /// unless the invite is still pending at `now`; exactly one caller per
    /// token gets `Some`. An identical existing grant is returned with
    /// `inserted == false`. A grant blocked by a different grant fails with
    /// [`StoreError::Conflict`] and leaves the invite pending.
    async fn redeem_invite(
        &self,
        token: &InviteToken,
        recipient: Principal,
        now: i64,
    ) -> Result<Option<Redeemed>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Directory Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Case-insensitive lookup by email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn get_family_member(&self, id: &FamilyMemberId) -> Result<Option<FamilyMember>>;

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>>;

    async fn put_user(&self, user: &User) -> Result<()>;

    async fn put_family_member(&self, member: &FamilyMember) -> Result<()>;

    async fn put_document(&self, document: &Document) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Team Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Public lock parameters for a team, if the team exists.
    async fn get_team_security(&self, team: &TeamId) -> Result<Option<TeamSecurity>>;

    /// Replace a team's lock parameters.
    async fn put_team_security(&self, team: &TeamId, security: &TeamSecurity) -> Result<()>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Create the share for `identity`, or return the one that already exists.
    ///
    /// The insert goes first and the unique index decides the winner; losers
    /// re-read the winning row. Concurrent callers with the same identity all
    /// receive the same record and exactly one sees `inserted == true`.
    fn upsert_share(
        &self,
        identity: ShareIdentity,
        now: i64,
    ) -> impl std::future::Future<Output = Result<Upserted<PrivateShare>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn upsert_share(
        &self,
        identity: ShareIdentity,
        now: i64,
    ) -> Result<Upserted<PrivateShare>> {
        let share = PrivateShare::new(identity, now);

        match self.insert_share(&share).await {
            Ok(()) => Ok(Upserted::inserted(share)),
            Err(e) if e.is_unique_violation() => {
                // The winner committed before our insert failed, so it is visible.
                match self.find_share(&identity).await? {
                    Some(existing) => Ok(Upserted::existing(existing)),
                    None => Err(StoreError::grant_conflict(&identity)),
                }
            }
            Err(e) => Err(e),
        }
    }
}
