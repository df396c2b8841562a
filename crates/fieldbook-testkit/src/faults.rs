//! Store wrapper that injects failures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use fieldbook_core::{
    Document, DocumentId, DocumentType, FamilyMember, FamilyMemberId, InviteToken,
    PendingPrivateShareInvite, Principal, PrivateShare, ShareId, ShareIdentity, ShareScope,
    TeamId, TeamSecurity, User, UserId,
};
use fieldbook_store::{Redeemed, Result, Store, StoreError};

/// Delegates to an inner store, optionally failing directory lookups once
/// a grant has been written.
///
/// Used to check that nothing after a committed grant can fail the call
/// that wrote it.
pub struct FaultyStore<S> {
    inner: Arc<S>,
    directory_after_grant: AtomicBool,
    grant_written: AtomicBool,
}

impl<S: Store> FaultyStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            directory_after_grant: AtomicBool::new(false),
            grant_written: AtomicBool::new(false),
        }
    }

    /// Fail `get_user`, `find_user_by_email` and `get_family_member` from
    /// the first successful grant write on.
    pub fn fail_directory_after_grant(self) -> Self {
        self.directory_after_grant.store(true, Ordering::SeqCst);
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn directory(&self) -> Result<()> {
        if self.directory_after_grant.load(Ordering::SeqCst)
            && self.grant_written.load(Ordering::SeqCst)
        {
            return Err(StoreError::Task("directory unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: Store> Store for FaultyStore<S> {
    async fn insert_share(&self, share: &PrivateShare) -> Result<()> {
        self.inner.insert_share(share).await?;
        self.grant_written.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn find_share(&self, identity: &ShareIdentity) -> Result<Option<PrivateShare>> {
        self.inner.find_share(identity).await
    }

    async fn get_share(&self, id: &ShareId) -> Result<Option<PrivateShare>> {
        self.inner.get_share(id).await
    }

    async fn delete_share(&self, id: &ShareId) -> Result<bool> {
        self.inner.delete_share(id).await
    }

    async fn shares_for_owner(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
    ) -> Result<Vec<PrivateShare>> {
        self.inner.shares_for_owner(owner, document_type, scope).await
    }

    async fn shares_for_principal(
        &self,
        principal: &Principal,
        document_type: DocumentType,
    ) -> Result<Vec<PrivateShare>> {
        self.inner.shares_for_principal(principal, document_type).await
    }

    async fn insert_invite(&self, invite: &PendingPrivateShareInvite) -> Result<()> {
        self.inner.insert_invite(invite).await
    }

    async fn find_pending_invite(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
        email: &str,
        now: i64,
    ) -> Result<Option<PendingPrivateShareInvite>> {
        self.inner
            .find_pending_invite(owner, document_type, scope, email, now)
            .await
    }

    async fn pending_invites(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
        now: i64,
    ) -> Result<Vec<PendingPrivateShareInvite>> {
        self.inner
            .pending_invites(owner, document_type, scope, now)
            .await
    }

    async fn get_invite_by_token(
        &self,
        token: &InviteToken,
    ) -> Result<Option<PendingPrivateShareInvite>> {
        self.inner.get_invite_by_token(token).await
    }

    async fn redeem_invite(
        &self,
        token: &InviteToken,
        recipient: Principal,
        now: i64,
    ) -> Result<Option<Redeemed>> {
        let redeemed = self.inner.redeem_invite(token, recipient, now).await?;
        if redeemed.is_some() {
            self.grant_written.store(true, Ordering::SeqCst);
        }
        Ok(redeemed)
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        self.directory()?;
        self.inner.get_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.directory()?;
        self.inner.find_user_by_email(email).await
    }

    async fn get_family_member(&self, id: &FamilyMemberId) -> Result<Option<FamilyMember>> {
        self.directory()?;
        self.inner.get_family_member(id).await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        self.inner.get_document(id).await
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        self.inner.put_user(user).await
    }

    async fn put_family_member(&self, member: &FamilyMember) -> Result<()> {
        self.inner.put_family_member(member).await
    }

    async fn put_document(&self, document: &Document) -> Result<()> {
        self.inner.put_document(document).await
    }

    async fn get_team_security(&self, team: &TeamId) -> Result<Option<TeamSecurity>> {
        self.inner.get_team_security(team).await
    }

    async fn put_team_security(&self, team: &TeamId, security: &TeamSecurity) -> Result<()> {
        self.inner.put_team_security(team, security).await
    }
}
