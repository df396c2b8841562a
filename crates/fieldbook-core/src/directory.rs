//! Records owned by external collaborators that sharing needs to read.
//!
//! Users, family members and documents are created and edited elsewhere.
//! Sharing only resolves targets against them and checks document ownership.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::share::{DocumentType, Principal};
use crate::team::EncryptedReportBody;
use crate::types::{DocumentId, FamilyMemberId, TeamId, UserId};

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
}

/// A family member managed by a guardian user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub id: FamilyMemberId,
    pub guardian_id: UserId,
    pub display_name: String,
}

/// A report body as stored: either plaintext fields or an opaque envelope.
///
/// Plaintext bodies of older reports may still carry an encrypted `notes`
/// field; telling those apart is the client's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportBody {
    Encrypted(EncryptedReportBody),
    Plain(Map<String, Value>),
}

impl ReportBody {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, ReportBody::Encrypted(_))
    }
}

/// A shareable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub document_type: DocumentType,
    pub created_by_id: UserId,
    pub team_id: Option<TeamId>,
    pub body: ReportBody,
    pub created_at: i64,
}

impl Document {
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.created_by_id == user
    }

    /// Whether `principal` is the document's creator.
    pub fn is_owned_by_principal(&self, principal: &Principal) -> bool {
        principal.as_user().as_ref() == Some(&self.created_by_id)
    }
}
