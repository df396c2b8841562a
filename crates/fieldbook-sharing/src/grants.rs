//! GrantStore: issuing, revoking and accepting share grants.

use std::sync::Arc;

use fieldbook_core::{
    now_millis, validate_email, DocumentType, InviteToken, PendingPrivateShareInvite, Principal,
    PrivateShare, ShareId, ShareIdentity, ShareScope, UserId, ValidationError,
};
use fieldbook_store::{Redeemed, Store, StoreExt};

use crate::access::AccessResolver;
use crate::config::{InvitePolicy, SharingConfig};
use crate::error::{InviteError, Result, SharingError};
use crate::notify::{DispatchWarning, GrantEvent, NotificationDispatcher};

/// Result of issuing a share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareOutcome {
    pub share: PrivateShare,
    /// False when an equivalent grant already existed.
    pub was_inserted: bool,
    pub warnings: Vec<DispatchWarning>,
}

/// Result of issuing an invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteOutcome {
    pub invite: PendingPrivateShareInvite,
    /// True when a pending invite was reused instead of creating one.
    pub reused: bool,
    pub warnings: Vec<DispatchWarning>,
}

/// Active grants and pending invites for one owner scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareListing {
    pub shares: Vec<PrivateShare>,
    pub invites: Vec<PendingPrivateShareInvite>,
}

/// Issues and revokes grants.
///
/// Uniqueness of grants is left entirely to the store. This type holds no
/// locks, so any number of callers may race to issue the same grant.
pub struct GrantStore<S: Store> {
    store: Arc<S>,
    access: AccessResolver<S>,
    dispatcher: NotificationDispatcher,
    config: SharingConfig,
}

impl<S: Store> GrantStore<S> {
    pub fn new(store: Arc<S>, dispatcher: NotificationDispatcher, config: SharingConfig) -> Self {
        Self {
            access: AccessResolver::new(Arc::clone(&store)),
            store,
            dispatcher,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn access(&self) -> &AccessResolver<S> {
        &self.access
    }

    pub fn config(&self) -> &SharingConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shares
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant `target` access to one document or to all of the owner's
    /// documents of a type.
    ///
    /// Issuing an existing grant again succeeds with `was_inserted == false`
    /// and sends no notification.
    pub async fn issue_share(
        &self,
        owner: UserId,
        document_type: DocumentType,
        scope: ShareScope,
        target: Principal,
    ) -> Result<ShareOutcome> {
        self.check_type(document_type)?;
        if target.as_user() == Some(owner) {
            return Err(SharingError::Unauthorized(
                "cannot share with yourself".to_string(),
            ));
        }

        self.authorize_scope(owner, document_type, &scope).await?;
        // Recipient lookups happen before the write so that nothing after the
        // commit can fail the call.
        let (notify_user, email) = self.resolve_target(&target).await?;

        let identity = ShareIdentity {
            owner_id: owner,
            document_type,
            scope,
            shared_with: target,
        };
        let upserted = self
            .store
            .upsert_share(identity, now_millis())
            .await
            .map_err(SharingError::from_grant_write)?;

        let warnings = if upserted.inserted {
            tracing::info!(
                share = %upserted.record.id,
                owner = %owner,
                %document_type,
                scope = scope.kind().as_str(),
                shared_with = %target,
                "share issued"
            );
            self.dispatcher
                .dispatch(GrantEvent::share_issued(&upserted.record, notify_user, email))
                .await
        } else {
            tracing::debug!(
                share = %upserted.record.id,
                shared_with = %target,
                "share already existed"
            );
            Vec::new()
        };

        Ok(ShareOutcome {
            share: upserted.record,
            was_inserted: upserted.inserted,
            warnings,
        })
    }

    /// Delete one of the owner's grants. Returns false if it does not exist.
    pub async fn revoke_share(&self, owner: UserId, share_id: &ShareId) -> Result<bool> {
        let Some(share) = self.store.get_share(share_id).await? else {
            tracing::debug!(share = %share_id, "revoke of absent share");
            return Ok(false);
        };

        if share.owner_id != owner {
            return Err(SharingError::Unauthorized(format!(
                "share {} belongs to another user",
                share_id
            )));
        }

        let deleted = self.store.delete_share(share_id).await?;
        if deleted {
            tracing::info!(share = %share_id, owner = %owner, "share revoked");
        }
        Ok(deleted)
    }

    /// Grants and pending invites the owner issued for a scope.
    pub async fn list_shares(
        &self,
        owner: UserId,
        document_type: DocumentType,
        scope: ShareScope,
    ) -> Result<ShareListing> {
        self.check_type(document_type)?;

        let shares = self
            .store
            .shares_for_owner(&owner, document_type, &scope)
            .await?;
        let invites = self
            .store
            .pending_invites(&owner, document_type, &scope, now_millis())
            .await?;

        Ok(ShareListing { shares, invites })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Invites
    // ─────────────────────────────────────────────────────────────────────────

    /// Invite an email address without an account.
    pub async fn issue_invite(
        &self,
        owner: UserId,
        document_type: DocumentType,
        scope: ShareScope,
        email: &str,
    ) -> Result<InviteOutcome> {
        self.check_type(document_type)?;
        let email = validate_email(email)?;

        self.authorize_scope(owner, document_type, &scope).await?;
        if let Some(user) = self.store.find_user_by_email(&email).await? {
            if user.id == owner {
                return Err(SharingError::Unauthorized(
                    "cannot invite yourself".to_string(),
                ));
            }
        }

        let now = now_millis();

        if self.config.invite_policy == InvitePolicy::ReusePending {
            if let Some(existing) = self
                .store
                .find_pending_invite(&owner, document_type, &scope, &email, now)
                .await?
            {
                tracing::debug!(invite = %existing.id, "resending pending invite");
                let warnings = self
                    .dispatcher
                    .dispatch(GrantEvent::invite_issued(&existing))
                    .await;
                return Ok(InviteOutcome {
                    invite: existing,
                    reused: true,
                    warnings,
                });
            }
        }

        let invite = PendingPrivateShareInvite::new(
            owner,
            document_type,
            scope,
            email,
            now,
            self.config.invite_ttl_ms,
        );
        self.store.insert_invite(&invite).await?;

        tracing::info!(
            invite = %invite.id,
            owner = %owner,
            %document_type,
            scope = scope.kind().as_str(),
            expires_at = invite.expires_at,
            "invite issued"
        );

        let warnings = self
            .dispatcher
            .dispatch(GrantEvent::invite_issued(&invite))
            .await;

        Ok(InviteOutcome {
            invite,
            reused: false,
            warnings,
        })
    }

    /// Redeem an invite token for `accepting_user`.
    ///
    /// The token is consumed at most once, and only together with the grant
    /// it turns into. If the grant cannot be written the invite stays
    /// pending and can be accepted again later.
    pub async fn accept_invite(
        &self,
        token: &InviteToken,
        accepting_user: UserId,
    ) -> Result<ShareOutcome> {
        let now = now_millis();

        let invite = self
            .store
            .get_invite_by_token(token)
            .await?
            .ok_or(InviteError::Unknown)?;
        check_invite_state(&invite, now)?;

        if invite.owner_id == accepting_user {
            return Err(SharingError::Unauthorized(
                "cannot accept your own invite".to_string(),
            ));
        }
        if self.store.get_user(&accepting_user).await?.is_none() {
            return Err(ValidationError::UnknownTarget.into());
        }
        self.authorize_ownership(invite.owner_id, invite.document_type, &invite.scope)
            .await?;

        let redeemed = self
            .store
            .redeem_invite(token, Principal::User(accepting_user), now)
            .await
            .map_err(SharingError::from_grant_write)?;
        let Some(Redeemed { invite, share }) = redeemed else {
            // Lost a race with another acceptance, or expired in between
            let current = self.store.get_invite_by_token(token).await?;
            return Err(match current {
                Some(current) => {
                    check_invite_state(&current, now_millis())?;
                    InviteError::AlreadyAccepted
                }
                None => InviteError::Unknown,
            }
            .into());
        };

        tracing::info!(
            invite = %invite.id,
            user = %accepting_user,
            share = %share.record.id,
            "invite accepted"
        );

        let warnings = if share.inserted {
            self.dispatcher
                .dispatch(GrantEvent::share_issued(&share.record, accepting_user, None))
                .await
        } else {
            Vec::new()
        };

        Ok(ShareOutcome {
            share: share.record,
            was_inserted: share.inserted,
            warnings,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checks
    // ─────────────────────────────────────────────────────────────────────────

    fn check_type(&self, document_type: DocumentType) -> Result<()> {
        if self.config.allows(document_type) {
            Ok(())
        } else {
            Err(ValidationError::DocumentTypeNotAllowed(document_type.to_string()).into())
        }
    }

    /// Re-share check first, then ownership, so a recipient trying to pass a
    /// document on gets a conflict rather than an authorization error.
    async fn authorize_scope(
        &self,
        owner: UserId,
        document_type: DocumentType,
        scope: &ShareScope,
    ) -> Result<()> {
        let ShareScope::One(document_id) = scope else {
            return Ok(());
        };

        let document = self
            .store
            .get_document(document_id)
            .await?
            .filter(|d| d.document_type == document_type)
            .ok_or_else(|| SharingError::NotFound(format!("{} {}", document_type, document_id)))?;

        if !document.is_owned_by(&owner)
            && self
                .access
                .has_access_to(&Principal::User(owner), &document)
                .await?
        {
            tracing::debug!(document = %document_id, user = %owner, "re-share rejected");
            return Err(SharingError::already_shared_to_you());
        }

        if !document.is_owned_by(&owner) {
            return Err(SharingError::Unauthorized(format!(
                "{} is not the owner of {}",
                owner, document_id
            )));
        }

        Ok(())
    }

    async fn authorize_ownership(
        &self,
        owner: UserId,
        document_type: DocumentType,
        scope: &ShareScope,
    ) -> Result<()> {
        let ShareScope::One(document_id) = scope else {
            return Ok(());
        };

        match self.store.get_document(document_id).await? {
            Some(doc) if doc.document_type == document_type && doc.is_owned_by(&owner) => Ok(()),
            Some(_) => Err(SharingError::Unauthorized(format!(
                "{} is not the owner of {}",
                owner, document_id
            ))),
            None => Err(SharingError::NotFound(format!(
                "{} {}",
                document_type, document_id
            ))),
        }
    }

    /// Resolve a target to the account that should be notified, the user
    /// itself or a family member's guardian, and that account's email.
    async fn resolve_target(&self, target: &Principal) -> Result<(UserId, Option<String>)> {
        match target {
            Principal::User(id) => match self.store.get_user(id).await? {
                Some(user) => Ok((user.id, Some(user.email))),
                None => Err(ValidationError::UnknownTarget.into()),
            },
            Principal::Family(id) => match self.store.get_family_member(id).await? {
                Some(member) => {
                    let email = self
                        .store
                        .get_user(&member.guardian_id)
                        .await?
                        .map(|guardian| guardian.email);
                    Ok((member.guardian_id, email))
                }
                None => Err(ValidationError::UnknownTarget.into()),
            },
        }
    }
}

fn check_invite_state(invite: &PendingPrivateShareInvite, now: i64) -> Result<()> {
    if invite.accepted_at.is_some() {
        return Err(InviteError::AlreadyAccepted.into());
    }
    if invite.is_expired(now) {
        return Err(InviteError::Expired.into());
    }
    Ok(())
}
