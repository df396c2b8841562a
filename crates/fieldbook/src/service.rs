//! ShareService: transport-agnostic request handling.
//!
//! Every handler takes the authenticated caller and a deserialized request,
//! validates all fields before touching the store, and returns a
//! serializable response. Wiring these to HTTP routes is left to the host.
//!
//! | Route                     | Handler                        |
//! |---------------------------|--------------------------------|
//! | `GET shares`              | [`ShareService::list_shares`]  |
//! | `POST shares`             | [`ShareService::create_share`] |
//! | `DELETE shares/{id}`      | [`ShareService::delete_share`] |
//! | `POST invites/accept`     | [`ShareService::accept_invite`]|
//! | `GET team-security`       | [`ShareService::team_security`]|
//! | report fetch              | [`ShareService::fetch_report`] |

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use fieldbook_core::{
    validate_email, AthleteType, DocumentId, DocumentType, InviteId, InviteToken,
    PendingPrivateShareInvite, Principal, PrivateShare, ReportBody, ScopeKind, ShareId,
    ShareScope, TeamId, TeamSecurity, UserId, ValidationError,
};
use fieldbook_sharing::{DispatchWarning, GrantStore, NotificationDispatcher, SharingConfig};
use fieldbook_store::Store;

use crate::error::{FieldbookError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Query for `GET shares`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSharesQuery {
    pub document_type: String,
    #[serde(default)]
    pub document_id: Option<String>,
}

/// Recipient reference inside a share request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub athlete_type: String,
    pub athlete_id: String,
}

/// Body of `POST shares`. Exactly one of `target` and `email` must be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShareRequest {
    pub document_type: String,
    #[serde(default)]
    pub document_id: Option<String>,
    pub scope: String,
    #[serde(default)]
    pub target: Option<TargetRef>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Body of `POST invites/accept`.
#[derive(Debug, Clone, Deserialize)]
pub struct AcceptInviteRequest {
    pub token: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ListSharesResponse {
    pub shares: Vec<PrivateShare>,
    pub invites: Vec<PendingPrivateShareInvite>,
}

/// Response of `POST shares`, tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CreateShareResponse {
    #[serde(rename_all = "camelCase")]
    Share {
        share: PrivateShare,
        was_inserted: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<DispatchWarning>,
    },
    #[serde(rename_all = "camelCase")]
    Invite {
        invite_id: InviteId,
        expires_at: i64,
        was_inserted: bool,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<DispatchWarning>,
    },
}

impl CreateShareResponse {
    pub fn warnings(&self) -> &[DispatchWarning] {
        match self {
            CreateShareResponse::Share { warnings, .. }
            | CreateShareResponse::Invite { warnings, .. } => warnings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteShareResponse {
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInviteResponse {
    pub share: PrivateShare,
    pub was_inserted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<DispatchWarning>,
}

/// A report as served to a viewer. The body is passed through untouched:
/// `{crypto: ...}` for locked teams, plaintext fields otherwise.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: DocumentId,
    pub document_type: DocumentType,
    pub created_by_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    pub body: ReportBody,
    pub created_at: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

fn parse_scope(scope: &str, document_id: Option<&str>) -> Result<ShareScope> {
    let kind: ScopeKind = scope.parse()?;
    let document_id = document_id.map(DocumentId::from_hex).transpose()?;
    Ok(ShareScope::from_parts(kind, document_id)?)
}

fn parse_target(target: &TargetRef) -> Result<Principal> {
    let athlete_type: AthleteType = target.athlete_type.parse()?;
    Ok(Principal::from_parts(athlete_type, &target.athlete_id)?)
}

enum Recipient {
    Principal(Principal),
    Email(String),
}

fn parse_recipient(request: &CreateShareRequest) -> Result<Recipient> {
    match (&request.target, &request.email) {
        (Some(target), None) => Ok(Recipient::Principal(parse_target(target)?)),
        (None, Some(email)) => Ok(Recipient::Email(validate_email(email)?)),
        _ => Err(ValidationError::AmbiguousTarget.into()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Request handlers for sharing and team lock endpoints.
pub struct ShareService<S: Store> {
    grants: GrantStore<S>,
}

impl<S: Store> ShareService<S> {
    pub fn new(store: Arc<S>, dispatcher: NotificationDispatcher, config: SharingConfig) -> Self {
        Self {
            grants: GrantStore::new(store, dispatcher, config),
        }
    }

    /// Service whose notifications and emails are only logged.
    pub fn with_logging(store: Arc<S>, config: SharingConfig) -> Self {
        let dispatcher = NotificationDispatcher::logging(config.dispatch_wait);
        Self::new(store, dispatcher, config)
    }

    pub fn grants(&self) -> &GrantStore<S> {
        &self.grants
    }

    /// `GET shares`: the caller's grants and pending invites for a scope.
    pub async fn list_shares(
        &self,
        caller: UserId,
        query: ListSharesQuery,
    ) -> Result<ListSharesResponse> {
        let document_type: DocumentType = query.document_type.parse()?;
        let scope = match query.document_id.as_deref() {
            Some(id) => ShareScope::One(DocumentId::from_hex(id)?),
            None => ShareScope::All,
        };

        let listing = self.grants.list_shares(caller, document_type, scope).await?;
        Ok(ListSharesResponse {
            shares: listing.shares,
            invites: listing.invites,
        })
    }

    /// `POST shares`: share with a principal, or by email.
    ///
    /// An email that belongs to an existing account becomes a direct share;
    /// anything else becomes an invite.
    pub async fn create_share(
        &self,
        caller: UserId,
        request: CreateShareRequest,
    ) -> Result<CreateShareResponse> {
        let document_type: DocumentType = request.document_type.parse()?;
        let scope = parse_scope(&request.scope, request.document_id.as_deref())?;
        let recipient = parse_recipient(&request)?;

        let target = match recipient {
            Recipient::Principal(p) => p,
            Recipient::Email(email) => {
                match self.grants.store().find_user_by_email(&email).await? {
                    Some(user) => Principal::User(user.id),
                    None => {
                        let outcome = self
                            .grants
                            .issue_invite(caller, document_type, scope, &email)
                            .await?;
                        return Ok(CreateShareResponse::Invite {
                            invite_id: outcome.invite.id,
                            expires_at: outcome.invite.expires_at,
                            was_inserted: !outcome.reused,
                            warnings: outcome.warnings,
                        });
                    }
                }
            }
        };

        let outcome = self
            .grants
            .issue_share(caller, document_type, scope, target)
            .await?;
        Ok(CreateShareResponse::Share {
            share: outcome.share,
            was_inserted: outcome.was_inserted,
            warnings: outcome.warnings,
        })
    }

    /// `DELETE shares/{id}`.
    pub async fn delete_share(&self, caller: UserId, share_id: &str) -> Result<DeleteShareResponse> {
        let share_id = ShareId::from_hex(share_id)?;
        let deleted = self.grants.revoke_share(caller, &share_id).await?;
        Ok(DeleteShareResponse { deleted })
    }

    /// `POST invites/accept`.
    pub async fn accept_invite(
        &self,
        caller: UserId,
        request: AcceptInviteRequest,
    ) -> Result<AcceptInviteResponse> {
        let token = InviteToken::parse(&request.token)?;
        let outcome = self.grants.accept_invite(&token, caller).await?;
        Ok(AcceptInviteResponse {
            share: outcome.share,
            was_inserted: outcome.was_inserted,
            warnings: outcome.warnings,
        })
    }

    /// `GET team-security`: public lock parameters only.
    pub async fn team_security(&self, team: &TeamId) -> Result<TeamSecurity> {
        self.grants
            .store()
            .get_team_security(team)
            .await?
            .ok_or_else(|| FieldbookError::NotFound(format!("team {}", team)))
    }

    /// Fetch a report for `viewer`, who must own it or hold a grant.
    ///
    /// The body is returned as stored. Decryption happens on the client.
    pub async fn fetch_report(
        &self,
        viewer: Principal,
        document_type: &str,
        document_id: &str,
    ) -> Result<ReportResponse> {
        let document_type: DocumentType = document_type.parse()?;
        let document_id = DocumentId::from_hex(document_id)?;

        let document = self
            .grants
            .store()
            .get_document(&document_id)
            .await?
            .filter(|d| d.document_type == document_type)
            .ok_or_else(|| FieldbookError::NotFound(format!("{} {}", document_type, document_id)))?;

        let allowed = document.is_owned_by_principal(&viewer)
            || self.grants.access().has_access_to(&viewer, &document).await?;
        if !allowed {
            tracing::debug!(document = %document_id, viewer = %viewer, "report fetch denied");
            return Err(FieldbookError::Forbidden(format!(
                "{} cannot view {}",
                viewer, document_id
            )));
        }

        Ok(ReportResponse {
            id: document.id,
            document_type: document.document_type,
            created_by_id: document.created_by_id,
            team_id: document.team_id,
            body: document.body,
            created_at: document.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_parse_scope() {
        let id = DocumentId::generate();
        assert_eq!(
            parse_scope("one", Some(&id.to_hex())).unwrap(),
            ShareScope::One(id)
        );
        assert_eq!(parse_scope("all", None).unwrap(), ShareScope::All);
        assert!(matches!(
            parse_scope("one", None),
            Err(FieldbookError::Validation(ValidationError::MissingDocumentId))
        ));
        assert!(matches!(
            parse_scope("some", None),
            Err(FieldbookError::Validation(ValidationError::UnknownScope(_)))
        ));
    }

    #[test]
    fn test_target_and_email_exclusive() {
        let request: CreateShareRequest = serde_json::from_value(json!({
            "documentType": "match-report",
            "scope": "all",
            "target": { "athleteType": "user", "athleteId": UserId::generate().to_hex() },
            "email": "coach@example.com"
        }))
        .unwrap();
        assert!(matches!(
            parse_recipient(&request),
            Err(FieldbookError::Validation(ValidationError::AmbiguousTarget))
        ));

        let request = CreateShareRequest {
            target: None,
            email: None,
            ..request
        };
        assert!(matches!(
            parse_recipient(&request),
            Err(FieldbookError::Validation(ValidationError::AmbiguousTarget))
        ));
    }

    #[test]
    fn test_invite_response_shape() {
        let response = CreateShareResponse::Invite {
            invite_id: InviteId::from_bytes([7; 16]),
            expires_at: 99,
            was_inserted: true,
            warnings: vec![],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            json!({
                "type": "invite",
                "inviteId": "07".repeat(16),
                "expiresAt": 99,
                "wasInserted": true
            })
        );
    }

    proptest! {
        #[test]
        fn unknown_scope_rejected(scope in "[a-z]{1,8}") {
            prop_assume!(scope != "one" && scope != "all");
            prop_assert!(parse_scope(&scope, None).is_err());
        }

        #[test]
        fn one_scope_accepts_any_document_id(bytes in any::<[u8; 16]>()) {
            let id = DocumentId::from_bytes(bytes);
            prop_assert_eq!(
                parse_scope("one", Some(&id.to_hex())).unwrap(),
                ShareScope::One(id)
            );
        }
    }
}
