//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use fieldbook_core::{
    Document, DocumentId, DocumentType, FamilyMember, FamilyMemberId, InviteId, InviteToken,
    PendingPrivateShareInvite, Principal, PrivateShare, ShareId, ShareIdentity, ShareScope,
    TeamId, TeamSecurity, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::traits::{Redeemed, Store, Upserted};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    shares: HashMap<ShareId, PrivateShare>,
    invites: HashMap<InviteId, PendingPrivateShareInvite>,
    users: HashMap<UserId, User>,
    family_members: HashMap<FamilyMemberId, FamilyMember>,
    documents: HashMap<DocumentId, Document>,
    teams: HashMap<TeamId, TeamSecurity>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Mirrors the two partial unique indexes on `private_shares`.
fn same_grant(a: &PrivateShare, b: &PrivateShare) -> bool {
    if a.document_type != b.document_type || a.shared_with != b.shared_with {
        return false;
    }
    match (a.scope, b.scope) {
        (ShareScope::One(x), ShareScope::One(y)) => x == y,
        (ShareScope::All, ShareScope::All) => true,
        _ => false,
    }
}

fn pending_for(
    invite: &PendingPrivateShareInvite,
    owner: &UserId,
    document_type: DocumentType,
    scope: &ShareScope,
    now: i64,
) -> bool {
    &invite.owner_id == owner
        && invite.document_type == document_type
        && &invite.scope == scope
        && invite.is_pending(now)
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_share(&self, share: &PrivateShare) -> Result<()> {
        let mut inner = self.write()?;

        if inner.shares.contains_key(&share.id) {
            return Err(StoreError::UniqueViolation(format!(
                "share id {} exists",
                share.id
            )));
        }
        if inner.shares.values().any(|s| same_grant(s, share)) {
            return Err(StoreError::UniqueViolation(format!(
                "{} already holds this grant",
                share.shared_with
            )));
        }

        inner.shares.insert(share.id, share.clone());
        Ok(())
    }

    async fn find_share(&self, identity: &ShareIdentity) -> Result<Option<PrivateShare>> {
        let inner = self.read()?;
        Ok(inner
            .shares
            .values()
            .find(|s| &s.identity() == identity)
            .cloned())
    }

    async fn get_share(&self, id: &ShareId) -> Result<Option<PrivateShare>> {
        Ok(self.read()?.shares.get(id).cloned())
    }

    async fn delete_share(&self, id: &ShareId) -> Result<bool> {
        Ok(self.write()?.shares.remove(id).is_some())
    }

    async fn shares_for_owner(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
    ) -> Result<Vec<PrivateShare>> {
        let inner = self.read()?;
        let mut shares: Vec<_> = inner
            .shares
            .values()
            .filter(|s| &s.owner_id == owner && s.document_type == document_type)
            .filter(|s| &s.scope == scope)
            .cloned()
            .collect();
        shares.sort_by_key(|s| (s.created_at, s.id));
        Ok(shares)
    }

    async fn shares_for_principal(
        &self,
        principal: &Principal,
        document_type: DocumentType,
    ) -> Result<Vec<PrivateShare>> {
        let inner = self.read()?;
        let mut shares: Vec<_> = inner
            .shares
            .values()
            .filter(|s| &s.shared_with == principal && s.document_type == document_type)
            .cloned()
            .collect();
        shares.sort_by_key(|s| (s.created_at, s.id));
        Ok(shares)
    }

    async fn insert_invite(&self, invite: &PendingPrivateShareInvite) -> Result<()> {
        let mut inner = self.write()?;

        if inner.invites.contains_key(&invite.id)
            || inner.invites.values().any(|i| i.token == invite.token)
        {
            return Err(StoreError::UniqueViolation("invite exists".to_string()));
        }

        inner.invites.insert(invite.id, invite.clone());
        Ok(())
    }

    async fn find_pending_invite(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
        email: &str,
        now: i64,
    ) -> Result<Option<PendingPrivateShareInvite>> {
        let inner = self.read()?;
        Ok(inner
            .invites
            .values()
            .filter(|i| pending_for(i, owner, document_type, scope, now))
            .filter(|i| i.email.eq_ignore_ascii_case(email))
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn pending_invites(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
        now: i64,
    ) -> Result<Vec<PendingPrivateShareInvite>> {
        let inner = self.read()?;
        let mut invites: Vec<_> = inner
            .invites
            .values()
            .filter(|i| pending_for(i, owner, document_type, scope, now))
            .cloned()
            .collect();
        invites.sort_by_key(|i| (i.created_at, i.id));
        Ok(invites)
    }

    async fn get_invite_by_token(
        &self,
        token: &InviteToken,
    ) -> Result<Option<PendingPrivateShareInvite>> {
        let inner = self.read()?;
        Ok(inner.invites.values().find(|i| &i.token == token).cloned())
    }

    async fn redeem_invite(
        &self,
        token: &InviteToken,
        recipient: Principal,
        now: i64,
    ) -> Result<Option<Redeemed>> {
        let mut guard = self.write()?;
        let inner = &mut *guard;

        let Some(invite) = inner
            .invites
            .values_mut()
            .find(|i| &i.token == token && i.is_pending(now))
        else {
            return Ok(None);
        };

        let identity = ShareIdentity {
            owner_id: invite.owner_id,
            document_type: invite.document_type,
            scope: invite.scope,
            shared_with: recipient,
        };
        let existing = inner
            .shares
            .values()
            .find(|s| s.identity() == identity)
            .cloned();

        let share = match existing {
            Some(existing) => Upserted::existing(existing),
            None => {
                let share = PrivateShare::new(identity, now);
                if inner.shares.values().any(|s| same_grant(s, &share)) {
                    return Err(StoreError::grant_conflict(&identity));
                }
                inner.shares.insert(share.id, share.clone());
                Upserted::inserted(share)
            }
        };

        invite.accepted_at = Some(now);
        Ok(Some(Redeemed {
            invite: invite.clone(),
            share,
        }))
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_family_member(&self, id: &FamilyMemberId) -> Result<Option<FamilyMember>> {
        Ok(self.read()?.family_members.get(id).cloned())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        Ok(self.read()?.documents.get(id).cloned())
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        let mut inner = self.write()?;

        let taken = inner
            .users
            .values()
            .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email));
        if taken {
            return Err(StoreError::UniqueViolation(format!(
                "email {} belongs to another user",
                user.email
            )));
        }

        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn put_family_member(&self, member: &FamilyMember) -> Result<()> {
        self.write()?.family_members.insert(member.id, member.clone());
        Ok(())
    }

    async fn put_document(&self, document: &Document) -> Result<()> {
        self.write()?.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get_team_security(&self, team: &TeamId) -> Result<Option<TeamSecurity>> {
        Ok(self.read()?.teams.get(team).cloned())
    }

    async fn put_team_security(&self, team: &TeamId, security: &TeamSecurity) -> Result<()> {
        self.write()?.teams.insert(*team, security.clone());
        Ok(())
    }
}
