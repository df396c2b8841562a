//! Share grants and pending invites.
//!
//! A share makes documents owned by one user visible to a principal. It
//! comes in two scopes that live in independent uniqueness domains:
//!
//! - `One(DocumentId)`: unique per (document type, document, recipient)
//! - `All`: unique per (document type, recipient) across all owners; covers
//!   every document of that type the owner has or will create
//!
//! Holding both for the same type and recipient is allowed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{DocumentId, FamilyMemberId, InviteId, InviteToken, ShareId, UserId};

/// Kinds of document that can be shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    MatchReport,
    PersonalScout,
}

impl DocumentType {
    pub const ALL: [DocumentType; 2] = [DocumentType::MatchReport, DocumentType::PersonalScout];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::MatchReport => "match-report",
            DocumentType::PersonalScout => "personal-scout",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "match-report" => Ok(DocumentType::MatchReport),
            "personal-scout" => Ok(DocumentType::PersonalScout),
            other => Err(ValidationError::UnknownDocumentType(other.to_string())),
        }
    }
}

/// The bare scope discriminator, as stored and sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    One,
    All,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::One => "one",
            ScopeKind::All => "all",
        }
    }
}

impl FromStr for ScopeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one" => Ok(ScopeKind::One),
            "all" => Ok(ScopeKind::All),
            other => Err(ValidationError::UnknownScope(other.to_string())),
        }
    }
}

/// Scope of a share. The document id exists only for single-document shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ScopeParts", into = "ScopeParts")]
pub enum ShareScope {
    One(DocumentId),
    All,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScopeParts {
    scope: ScopeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document_id: Option<DocumentId>,
}

impl TryFrom<ScopeParts> for ShareScope {
    type Error = ValidationError;

    fn try_from(parts: ScopeParts) -> Result<Self, Self::Error> {
        ShareScope::from_parts(parts.scope, parts.document_id)
    }
}

impl From<ShareScope> for ScopeParts {
    fn from(scope: ShareScope) -> Self {
        ScopeParts {
            scope: scope.kind(),
            document_id: scope.document_id(),
        }
    }
}

impl ShareScope {
    /// Combine a scope discriminator and an optional document id.
    pub fn from_parts(
        kind: ScopeKind,
        document_id: Option<DocumentId>,
    ) -> Result<Self, ValidationError> {
        match (kind, document_id) {
            (ScopeKind::One, Some(id)) => Ok(ShareScope::One(id)),
            (ScopeKind::One, None) => Err(ValidationError::MissingDocumentId),
            (ScopeKind::All, None) => Ok(ShareScope::All),
            (ScopeKind::All, Some(_)) => Err(ValidationError::UnexpectedDocumentId),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            ShareScope::One(_) => ScopeKind::One,
            ShareScope::All => ScopeKind::All,
        }
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        match self {
            ShareScope::One(id) => Some(*id),
            ShareScope::All => None,
        }
    }

    /// Whether a share with this scope exposes the given document of its type.
    ///
    /// `All` is live: it matches documents created after the share.
    pub fn covers(&self, document_id: &DocumentId) -> bool {
        match self {
            ShareScope::One(id) => id == document_id,
            ShareScope::All => true,
        }
    }
}

/// Whether a principal is a user account or a family member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AthleteType {
    User,
    Family,
}

impl AthleteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AthleteType::User => "user",
            AthleteType::Family => "family",
        }
    }
}

impl FromStr for AthleteType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(AthleteType::User),
            "family" => Ok(AthleteType::Family),
            other => Err(ValidationError::UnknownAthleteType(other.to_string())),
        }
    }
}

/// The recipient of a share (`sharedWith` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PrincipalParts", into = "PrincipalParts")]
pub enum Principal {
    User(UserId),
    Family(FamilyMemberId),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrincipalParts {
    athlete_type: AthleteType,
    athlete_id: String,
}

impl TryFrom<PrincipalParts> for Principal {
    type Error = ValidationError;

    fn try_from(parts: PrincipalParts) -> Result<Self, Self::Error> {
        Principal::from_parts(parts.athlete_type, &parts.athlete_id)
    }
}

impl From<Principal> for PrincipalParts {
    fn from(p: Principal) -> Self {
        PrincipalParts {
            athlete_type: p.athlete_type(),
            athlete_id: p.athlete_id_hex(),
        }
    }
}

impl Principal {
    pub fn from_parts(athlete_type: AthleteType, athlete_id: &str) -> Result<Self, ValidationError> {
        match athlete_type {
            AthleteType::User => Ok(Principal::User(UserId::from_hex(athlete_id)?)),
            AthleteType::Family => Ok(Principal::Family(FamilyMemberId::from_hex(athlete_id)?)),
        }
    }

    pub fn athlete_type(&self) -> AthleteType {
        match self {
            Principal::User(_) => AthleteType::User,
            Principal::Family(_) => AthleteType::Family,
        }
    }

    /// Raw id bytes, used as the storage key next to the athlete type.
    pub fn athlete_id_bytes(&self) -> [u8; 16] {
        match self {
            Principal::User(id) => id.0,
            Principal::Family(id) => id.0,
        }
    }

    pub fn athlete_id_hex(&self) -> String {
        hex::encode(self.athlete_id_bytes())
    }

    pub fn as_user(&self) -> Option<UserId> {
        match self {
            Principal::User(id) => Some(*id),
            Principal::Family(_) => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.athlete_type().as_str(), self.athlete_id_hex())
    }
}

/// The full identity tuple a share is deduplicated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShareIdentity {
    pub owner_id: UserId,
    pub document_type: DocumentType,
    pub scope: ShareScope,
    pub shared_with: Principal,
}

/// A persisted share grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateShare {
    pub id: ShareId,
    pub owner_id: UserId,
    pub document_type: DocumentType,
    #[serde(flatten)]
    pub scope: ShareScope,
    pub shared_with: Principal,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PrivateShare {
    /// Build a new share record for the given identity.
    pub fn new(identity: ShareIdentity, now: i64) -> Self {
        Self {
            id: ShareId::generate(),
            owner_id: identity.owner_id,
            document_type: identity.document_type,
            scope: identity.scope,
            shared_with: identity.shared_with,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn identity(&self) -> ShareIdentity {
        ShareIdentity {
            owner_id: self.owner_id,
            document_type: self.document_type,
            scope: self.scope,
            shared_with: self.shared_with,
        }
    }

    /// Whether this share exposes `document_id`, a document of
    /// `document_type` created by `created_by`.
    pub fn exposes(
        &self,
        document_type: DocumentType,
        document_id: &DocumentId,
        created_by: &UserId,
    ) -> bool {
        self.document_type == document_type
            && &self.owner_id == created_by
            && self.scope.covers(document_id)
    }
}

/// An emailed invite for someone who does not have an account yet.
///
/// The token is never serialized; it only travels in the invite email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPrivateShareInvite {
    pub id: InviteId,
    pub owner_id: UserId,
    pub document_type: DocumentType,
    #[serde(flatten)]
    pub scope: ShareScope,
    pub email: String,
    #[serde(skip_serializing)]
    pub token: InviteToken,
    pub created_at: i64,
    pub expires_at: i64,
    pub accepted_at: Option<i64>,
}

impl PendingPrivateShareInvite {
    /// Build a fresh invite with a new token expiring `ttl_ms` after `now`.
    pub fn new(
        owner_id: UserId,
        document_type: DocumentType,
        scope: ShareScope,
        email: String,
        now: i64,
        ttl_ms: i64,
    ) -> Self {
        Self {
            id: InviteId::generate(),
            owner_id,
            document_type,
            scope,
            email,
            token: InviteToken::generate(),
            created_at: now,
            expires_at: now + ttl_ms,
            accepted_at: None,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Not yet accepted and not expired.
    pub fn is_pending(&self, now: i64) -> bool {
        self.accepted_at.is_none() && !self.is_expired(now)
    }
}
