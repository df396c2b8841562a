//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Fieldbook sharing. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};

use fieldbook_core::{
    AthleteType, Document, DocumentId, DocumentType, FamilyMember, FamilyMemberId, InviteToken,
    PendingPrivateShareInvite, Principal, PrivateShare, ScopeKind, ShareId, ShareIdentity,
    ShareScope, TeamId, TeamSecurity, User, UserId, ValidationError,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Redeemed, Store, Upserted};

const SHARE_COLUMNS: &str = "share_id, owner_id, document_type, scope, document_id, \
     athlete_type, athlete_id, created_at, updated_at";

const INVITE_COLUMNS: &str = "invite_id, owner_id, document_type, scope, document_id, \
     email, token, created_at, expires_at, accepted_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    ffi::Error::new(ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// Unique and primary-key violations become UniqueViolation; everything else
// stays a database error.
fn map_write_error(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, msg) = &e {
        if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
            || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return StoreError::UniqueViolation(
                msg.clone().unwrap_or_else(|| err.to_string()),
            );
        }
    }
    StoreError::Database(e)
}

fn conversion_error(
    row: &Row<'_>,
    column: &str,
    ty: Type,
    e: ValidationError,
) -> rusqlite::Error {
    let idx = row.as_ref().column_index(column).unwrap_or(0);
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(e))
}

fn id_column<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: for<'a> TryFrom<&'a [u8], Error = ValidationError>,
{
    let bytes: Vec<u8> = row.get(column)?;
    T::try_from(bytes.as_slice()).map_err(|e| conversion_error(row, column, Type::Blob, e))
}

fn opt_id_column<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<T>>
where
    T: for<'a> TryFrom<&'a [u8], Error = ValidationError>,
{
    let bytes: Option<Vec<u8>> = row.get(column)?;
    bytes
        .map(|b| T::try_from(b.as_slice()))
        .transpose()
        .map_err(|e| conversion_error(row, column, Type::Blob, e))
}

fn text_column<T>(row: &Row<'_>, column: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = ValidationError>,
{
    let s: String = row.get(column)?;
    s.parse().map_err(|e| conversion_error(row, column, Type::Text, e))
}

fn scope_columns(row: &Row<'_>) -> rusqlite::Result<ShareScope> {
    let kind: ScopeKind = text_column(row, "scope")?;
    let document_id: Option<DocumentId> = opt_id_column(row, "document_id")?;
    ShareScope::from_parts(kind, document_id)
        .map_err(|e| conversion_error(row, "document_id", Type::Blob, e))
}

fn row_to_share(row: &Row<'_>) -> rusqlite::Result<PrivateShare> {
    let athlete_type: AthleteType = text_column(row, "athlete_type")?;
    let shared_with = match athlete_type {
        AthleteType::User => Principal::User(id_column(row, "athlete_id")?),
        AthleteType::Family => Principal::Family(id_column(row, "athlete_id")?),
    };

    Ok(PrivateShare {
        id: id_column(row, "share_id")?,
        owner_id: id_column(row, "owner_id")?,
        document_type: text_column(row, "document_type")?,
        scope: scope_columns(row)?,
        shared_with,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_invite(row: &Row<'_>) -> rusqlite::Result<PendingPrivateShareInvite> {
    let token: String = row.get("token")?;
    let token = InviteToken::parse(&token)
        .map_err(|e| conversion_error(row, "token", Type::Text, e))?;

    Ok(PendingPrivateShareInvite {
        id: id_column(row, "invite_id")?,
        owner_id: id_column(row, "owner_id")?,
        document_type: text_column(row, "document_type")?,
        scope: scope_columns(row)?,
        email: row.get("email")?,
        token,
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
        accepted_at: row.get("accepted_at")?,
    })
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: id_column(row, "user_id")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
    })
}

fn document_id_param(scope: &ShareScope) -> Option<Vec<u8>> {
    scope.document_id().map(|id| id.as_bytes().to_vec())
}

fn insert_share_row(conn: &Connection, share: &PrivateShare) -> Result<()> {
    conn.execute(
        "INSERT INTO private_shares (
            share_id, owner_id, document_type, scope, document_id,
            athlete_type, athlete_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            share.id.as_bytes().as_slice(),
            share.owner_id.as_bytes().as_slice(),
            share.document_type.as_str(),
            share.scope.kind().as_str(),
            document_id_param(&share.scope),
            share.shared_with.athlete_type().as_str(),
            share.shared_with.athlete_id_bytes().as_slice(),
            share.created_at,
            share.updated_at,
        ],
    )
    .map_err(map_write_error)?;
    Ok(())
}

fn select_share(conn: &Connection, identity: &ShareIdentity) -> Result<Option<PrivateShare>> {
    let sql = format!(
        "SELECT {SHARE_COLUMNS} FROM private_shares
         WHERE owner_id = ?1 AND document_type = ?2 AND scope = ?3
           AND document_id IS ?4 AND athlete_type = ?5 AND athlete_id = ?6"
    );
    let share = conn
        .query_row(
            &sql,
            params![
                identity.owner_id.as_bytes().as_slice(),
                identity.document_type.as_str(),
                identity.scope.kind().as_str(),
                document_id_param(&identity.scope),
                identity.shared_with.athlete_type().as_str(),
                identity.shared_with.athlete_id_bytes().as_slice(),
            ],
            row_to_share,
        )
        .optional()?;
    Ok(share)
}

#[async_trait]
impl Store for SqliteStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Shares
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_share(&self, share: &PrivateShare) -> Result<()> {
        let share = share.clone();
        self.call(move |conn| insert_share_row(conn, &share)).await
    }

    async fn find_share(&self, identity: &ShareIdentity) -> Result<Option<PrivateShare>> {
        let identity = *identity;
        self.call(move |conn| select_share(conn, &identity)).await
    }

    async fn get_share(&self, id: &ShareId) -> Result<Option<PrivateShare>> {
        let id = *id;

        self.call(move |conn| {
            let sql = format!("SELECT {SHARE_COLUMNS} FROM private_shares WHERE share_id = ?1");
            let share = conn
                .query_row(&sql, params![id.as_bytes().as_slice()], row_to_share)
                .optional()?;
            Ok(share)
        })
        .await
    }

    async fn delete_share(&self, id: &ShareId) -> Result<bool> {
        let id = *id;

        self.call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM private_shares WHERE share_id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn shares_for_owner(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
    ) -> Result<Vec<PrivateShare>> {
        let owner = *owner;
        let scope = *scope;

        self.call(move |conn| {
            let sql = format!(
                "SELECT {SHARE_COLUMNS} FROM private_shares
                 WHERE owner_id = ?1 AND document_type = ?2 AND scope = ?3 AND document_id IS ?4
                 ORDER BY created_at, share_id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let shares = stmt
                .query_map(
                    params![
                        owner.as_bytes().as_slice(),
                        document_type.as_str(),
                        scope.kind().as_str(),
                        document_id_param(&scope),
                    ],
                    row_to_share,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(shares)
        })
        .await
    }

    async fn shares_for_principal(
        &self,
        principal: &Principal,
        document_type: DocumentType,
    ) -> Result<Vec<PrivateShare>> {
        let principal = *principal;

        self.call(move |conn| {
            let sql = format!(
                "SELECT {SHARE_COLUMNS} FROM private_shares
                 WHERE athlete_type = ?1 AND athlete_id = ?2 AND document_type = ?3
                 ORDER BY created_at, share_id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let shares = stmt
                .query_map(
                    params![
                        principal.athlete_type().as_str(),
                        principal.athlete_id_bytes().as_slice(),
                        document_type.as_str(),
                    ],
                    row_to_share,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(shares)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Invites
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_invite(&self, invite: &PendingPrivateShareInvite) -> Result<()> {
        let invite = invite.clone();

        self.call(move |conn| {
            conn.execute(
                "INSERT INTO share_invites (
                    invite_id, owner_id, document_type, scope, document_id,
                    email, token, created_at, expires_at, accepted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    invite.id.as_bytes().as_slice(),
                    invite.owner_id.as_bytes().as_slice(),
                    invite.document_type.as_str(),
                    invite.scope.kind().as_str(),
                    document_id_param(&invite.scope),
                    invite.email,
                    invite.token.as_str(),
                    invite.created_at,
                    invite.expires_at,
                    invite.accepted_at,
                ],
            )
            .map_err(map_write_error)?;
            Ok(())
        })
        .await
    }

    async fn find_pending_invite(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
        email: &str,
        now: i64,
    ) -> Result<Option<PendingPrivateShareInvite>> {
        let owner = *owner;
        let scope = *scope;
        let email = email.to_string();

        self.call(move |conn| {
            let sql = format!(
                "SELECT {INVITE_COLUMNS} FROM share_invites
                 WHERE owner_id = ?1 AND document_type = ?2 AND scope = ?3 AND document_id IS ?4
                   AND email = ?5 AND accepted_at IS NULL AND expires_at > ?6
                 ORDER BY created_at DESC
                 LIMIT 1"
            );
            let invite = conn
                .query_row(
                    &sql,
                    params![
                        owner.as_bytes().as_slice(),
                        document_type.as_str(),
                        scope.kind().as_str(),
                        document_id_param(&scope),
                        email,
                        now,
                    ],
                    row_to_invite,
                )
                .optional()?;
            Ok(invite)
        })
        .await
    }

    async fn pending_invites(
        &self,
        owner: &UserId,
        document_type: DocumentType,
        scope: &ShareScope,
        now: i64,
    ) -> Result<Vec<PendingPrivateShareInvite>> {
        let owner = *owner;
        let scope = *scope;

        self.call(move |conn| {
            let sql = format!(
                "SELECT {INVITE_COLUMNS} FROM share_invites
                 WHERE owner_id = ?1 AND document_type = ?2 AND scope = ?3 AND document_id IS ?4
                   AND accepted_at IS NULL AND expires_at > ?5
                 ORDER BY created_at, invite_id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let invites = stmt
                .query_map(
                    params![
                        owner.as_bytes().as_slice(),
                        document_type.as_str(),
                        scope.kind().as_str(),
                        document_id_param(&scope),
                        now,
                    ],
                    row_to_invite,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(invites)
        })
        .await
    }

    async fn get_invite_by_token(
        &self,
        token: &InviteToken,
    ) -> Result<Option<PendingPrivateShareInvite>> {
        let token = token.clone();

        self.call(move |conn| {
            let sql = format!("SELECT {INVITE_COLUMNS} FROM share_invites WHERE token = ?1");
            let invite = conn
                .query_row(&sql, params![token.as_str()], row_to_invite)
                .optional()?;
            Ok(invite)
        })
        .await
    }

    async fn redeem_invite(
        &self,
        token: &InviteToken,
        recipient: Principal,
        now: i64,
    ) -> Result<Option<Redeemed>> {
        let token = token.clone();

        self.call(move |conn| {
            // Dropping the transaction on any early return rolls back the
            // accepted_at update.
            let tx = conn.transaction()?;

            let updated = tx.execute(
                "UPDATE share_invites SET accepted_at = ?2
                 WHERE token = ?1 AND accepted_at IS NULL AND expires_at > ?2",
                params![token.as_str(), now],
            )?;
            if updated == 0 {
                return Ok(None);
            }

            let sql = format!("SELECT {INVITE_COLUMNS} FROM share_invites WHERE token = ?1");
            let invite = tx.query_row(&sql, params![token.as_str()], row_to_invite)?;

            let identity = ShareIdentity {
                owner_id: invite.owner_id,
                document_type: invite.document_type,
                scope: invite.scope,
                shared_with: recipient,
            };
            let candidate = PrivateShare::new(identity, now);
            let share = match insert_share_row(&tx, &candidate) {
                Ok(()) => Upserted::inserted(candidate),
                Err(e) if e.is_unique_violation() => match select_share(&tx, &identity)? {
                    Some(existing) => Upserted::existing(existing),
                    None => return Err(StoreError::grant_conflict(&identity)),
                },
                Err(e) => return Err(e),
            };

            tx.commit()?;
            Ok(Some(Redeemed { invite, share }))
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Directory
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let id = *id;

        self.call(move |conn| {
            let user = conn
                .query_row(
                    "SELECT user_id, email, display_name FROM users WHERE user_id = ?1",
                    params![id.as_bytes().as_slice()],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();

        self.call(move |conn| {
            let user = conn
                .query_row(
                    "SELECT user_id, email, display_name FROM users WHERE email = ?1",
                    params![email],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    async fn get_family_member(&self, id: &FamilyMemberId) -> Result<Option<FamilyMember>> {
        let id = *id;

        self.call(move |conn| {
            let member = conn
                .query_row(
                    "SELECT member_id, guardian_id, display_name FROM family_members
                     WHERE member_id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| {
                        Ok(FamilyMember {
                            id: id_column(row, "member_id")?,
                            guardian_id: id_column(row, "guardian_id")?,
                            display_name: row.get("display_name")?,
                        })
                    },
                )
                .optional()?;
            Ok(member)
        })
        .await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        let id = *id;

        self.call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT document_id, document_type, created_by_id, team_id, body, created_at
                     FROM documents WHERE document_id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| {
                        let body: String = row.get("body")?;
                        Ok((
                            id_column::<DocumentId>(row, "document_id")?,
                            text_column::<DocumentType>(row, "document_type")?,
                            id_column::<UserId>(row, "created_by_id")?,
                            opt_id_column::<TeamId>(row, "team_id")?,
                            body,
                            row.get::<_, i64>("created_at")?,
                        ))
                    },
                )
                .optional()?;

            match row {
                Some((id, document_type, created_by_id, team_id, body, created_at)) => {
                    Ok(Some(Document {
                        id,
                        document_type,
                        created_by_id,
                        team_id,
                        body: serde_json::from_str(&body)?,
                        created_at,
                    }))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn put_user(&self, user: &User) -> Result<()> {
        let user = user.clone();

        self.call(move |conn| {
            conn.execute(
                "INSERT INTO users (user_id, email, display_name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                    email = excluded.email,
                    display_name = excluded.display_name",
                params![user.id.as_bytes().as_slice(), user.email, user.display_name],
            )
            .map_err(map_write_error)?;
            Ok(())
        })
        .await
    }

    async fn put_family_member(&self, member: &FamilyMember) -> Result<()> {
        let member = member.clone();

        self.call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO family_members (member_id, guardian_id, display_name)
                 VALUES (?1, ?2, ?3)",
                params![
                    member.id.as_bytes().as_slice(),
                    member.guardian_id.as_bytes().as_slice(),
                    member.display_name,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn put_document(&self, document: &Document) -> Result<()> {
        let body = serde_json::to_string(&document.body)?;
        let document = document.clone();

        self.call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO documents (
                    document_id, document_type, created_by_id, team_id, body, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    document.id.as_bytes().as_slice(),
                    document.document_type.as_str(),
                    document.created_by_id.as_bytes().as_slice(),
                    document.team_id.map(|t| t.as_bytes().to_vec()),
                    body,
                    document.created_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Teams
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_team_security(&self, team: &TeamId) -> Result<Option<TeamSecurity>> {
        let team = *team;

        self.call(move |conn| {
            let json: Option<String> = conn
                .query_row(
                    "SELECT security FROM team_security WHERE team_id = ?1",
                    params![team.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
                .transpose()
        })
        .await
    }

    async fn put_team_security(&self, team: &TeamId, security: &TeamSecurity) -> Result<()> {
        let team = *team;
        let json = serde_json::to_string(security)?;

        self.call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO team_security (team_id, security) VALUES (?1, ?2)",
                params![team.as_bytes().as_slice(), json],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StoreExt;
    use fieldbook_core::{ReportBody, DAY_MS};
    use serde_json::json;

    fn identity(owner: UserId, scope: ShareScope, to: Principal) -> ShareIdentity {
        ShareIdentity {
            owner_id: owner,
            document_type: DocumentType::MatchReport,
            scope,
            shared_with: to,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_share() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = UserId::generate();
        let share = PrivateShare::new(
            identity(
                owner,
                ShareScope::One(DocumentId::generate()),
                Principal::User(UserId::generate()),
            ),
            1000,
        );

        store.insert_share(&share).await.unwrap();
        let loaded = store.get_share(&share.id).await.unwrap().unwrap();
        assert_eq!(loaded, share);
    }

    #[tokio::test]
    async fn test_one_scope_unique_per_document_and_recipient() {
        let store = SqliteStore::open_memory().unwrap();
        let id = identity(
            UserId::generate(),
            ShareScope::One(DocumentId::generate()),
            Principal::Family(FamilyMemberId::generate()),
        );

        store.insert_share(&PrivateShare::new(id, 1)).await.unwrap();
        let err = store
            .insert_share(&PrivateShare::new(id, 2))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_all_scope_unique_per_recipient() {
        let store = SqliteStore::open_memory().unwrap();
        let recipient = Principal::User(UserId::generate());
        let first = identity(UserId::generate(), ShareScope::All, recipient);
        let second = identity(UserId::generate(), ShareScope::All, recipient);

        store.insert_share(&PrivateShare::new(first, 1)).await.unwrap();
        // A second owner cannot take the same recipient's slot
        let err = store
            .insert_share(&PrivateShare::new(second, 1))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        let err = store.upsert_share(second, 2).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let held = store
            .shares_for_principal(&recipient, DocumentType::MatchReport)
            .await
            .unwrap();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].owner_id, first.owner_id);
    }

    #[tokio::test]
    async fn test_upsert_returns_existing() {
        let store = SqliteStore::open_memory().unwrap();
        let id = identity(
            UserId::generate(),
            ShareScope::All,
            Principal::User(UserId::generate()),
        );

        let first = store.upsert_share(id, 10).await.unwrap();
        let second = store.upsert_share(id, 20).await.unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(first.record.id, second.record.id);
        assert_eq!(second.record.created_at, 10);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_single_winner() {
        let store = SqliteStore::open_memory().unwrap();
        let id = identity(
            UserId::generate(),
            ShareScope::One(DocumentId::generate()),
            Principal::User(UserId::generate()),
        );

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.upsert_share(id, i).await }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(results.iter().filter(|r| r.inserted).count(), 1);
        let winner = results[0].record.id;
        assert!(results.iter().all(|r| r.record.id == winner));

        let all = store
            .shares_for_owner(&id.owner_id, id.document_type, &id.scope)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_shares_for_principal_and_delete() {
        let store = SqliteStore::open_memory().unwrap();
        let recipient = Principal::Family(FamilyMemberId::generate());
        let share = PrivateShare::new(
            identity(UserId::generate(), ShareScope::All, recipient),
            5,
        );
        store.insert_share(&share).await.unwrap();

        let found = store
            .shares_for_principal(&recipient, DocumentType::MatchReport)
            .await
            .unwrap();
        assert_eq!(found, vec![share.clone()]);

        let other_type = store
            .shares_for_principal(&recipient, DocumentType::PersonalScout)
            .await
            .unwrap();
        assert!(other_type.is_empty());

        assert!(store.delete_share(&share.id).await.unwrap());
        assert!(!store.delete_share(&share.id).await.unwrap());
        assert!(store.get_share(&share.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invite_redeemed_once() {
        let store = SqliteStore::open_memory().unwrap();
        let invite = PendingPrivateShareInvite::new(
            UserId::generate(),
            DocumentType::PersonalScout,
            ShareScope::All,
            "coach@example.com".to_string(),
            1000,
            DAY_MS,
        );
        store.insert_invite(&invite).await.unwrap();
        let recipient = Principal::User(UserId::generate());

        let redeemed = store
            .redeem_invite(&invite.token, recipient, 2000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(redeemed.invite.accepted_at, Some(2000));
        assert!(redeemed.share.inserted);
        assert_eq!(redeemed.share.record.owner_id, invite.owner_id);
        assert_eq!(redeemed.share.record.shared_with, recipient);

        assert!(store
            .redeem_invite(&invite.token, recipient, 3000)
            .await
            .unwrap()
            .is_none());
        let held = store
            .shares_for_principal(&recipient, DocumentType::PersonalScout)
            .await
            .unwrap();
        assert_eq!(held, vec![redeemed.share.record]);
    }

    #[tokio::test]
    async fn test_redeem_reuses_identical_grant() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = UserId::generate();
        let recipient = Principal::User(UserId::generate());
        let doc = DocumentId::generate();
        let existing = store
            .upsert_share(identity(owner, ShareScope::One(doc), recipient), 1)
            .await
            .unwrap()
            .record;

        let invite = PendingPrivateShareInvite::new(
            owner,
            DocumentType::MatchReport,
            ShareScope::One(doc),
            "coach@example.com".to_string(),
            1,
            DAY_MS,
        );
        store.insert_invite(&invite).await.unwrap();

        let redeemed = store
            .redeem_invite(&invite.token, recipient, 2)
            .await
            .unwrap()
            .unwrap();
        assert!(!redeemed.share.inserted);
        assert_eq!(redeemed.share.record, existing);
        assert_eq!(redeemed.invite.accepted_at, Some(2));
    }

    #[tokio::test]
    async fn test_expired_invite_not_redeemed() {
        let store = SqliteStore::open_memory().unwrap();
        let invite = PendingPrivateShareInvite::new(
            UserId::generate(),
            DocumentType::MatchReport,
            ShareScope::All,
            "coach@example.com".to_string(),
            0,
            100,
        );
        store.insert_invite(&invite).await.unwrap();
        let recipient = Principal::User(UserId::generate());

        assert!(store
            .redeem_invite(&invite.token, recipient, 100)
            .await
            .unwrap()
            .is_none());
        let stored = store
            .get_invite_by_token(&invite.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.accepted_at, None);
        assert!(store
            .shares_for_principal(&recipient, DocumentType::MatchReport)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_failed_grant_leaves_invite_pending() {
        let store = SqliteStore::open_memory().unwrap();
        let invite = PendingPrivateShareInvite::new(
            UserId::generate(),
            DocumentType::MatchReport,
            ShareScope::One(DocumentId::generate()),
            "coach@example.com".to_string(),
            0,
            DAY_MS,
        );
        store.insert_invite(&invite).await.unwrap();
        let recipient = Principal::User(UserId::generate());

        store
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_shares BEFORE INSERT ON private_shares
                     BEGIN SELECT RAISE(ABORT, 'disk gone'); END;",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store
            .redeem_invite(&invite.token, recipient, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        let stored = store
            .get_invite_by_token(&invite.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.accepted_at, None);

        store
            .call(|conn| {
                conn.execute_batch("DROP TRIGGER reject_shares;")?;
                Ok(())
            })
            .await
            .unwrap();

        let redeemed = store
            .redeem_invite(&invite.token, recipient, 2)
            .await
            .unwrap()
            .unwrap();
        assert!(redeemed.share.inserted);
        assert_eq!(redeemed.invite.accepted_at, Some(2));
    }

    #[tokio::test]
    async fn test_blocked_redeem_rolls_back() {
        let store = SqliteStore::open_memory().unwrap();
        let recipient = Principal::Family(FamilyMemberId::generate());
        let blocking = store
            .upsert_share(identity(UserId::generate(), ShareScope::All, recipient), 0)
            .await
            .unwrap()
            .record;

        let invite = PendingPrivateShareInvite::new(
            UserId::generate(),
            DocumentType::MatchReport,
            ShareScope::All,
            "parent@example.com".to_string(),
            0,
            DAY_MS,
        );
        store.insert_invite(&invite).await.unwrap();

        let err = store
            .redeem_invite(&invite.token, recipient, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let stored = store
            .get_invite_by_token(&invite.token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.accepted_at, None);

        assert!(store.delete_share(&blocking.id).await.unwrap());
        let redeemed = store
            .redeem_invite(&invite.token, recipient, 2)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(redeemed.share.record.owner_id, invite.owner_id);
    }

    #[tokio::test]
    async fn test_find_pending_invite_ignores_case() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = UserId::generate();
        let invite = PendingPrivateShareInvite::new(
            owner,
            DocumentType::MatchReport,
            ShareScope::All,
            "coach@example.com".to_string(),
            0,
            DAY_MS,
        );
        store.insert_invite(&invite).await.unwrap();

        let found = store
            .find_pending_invite(
                &owner,
                DocumentType::MatchReport,
                &ShareScope::All,
                "Coach@Example.com",
                10,
            )
            .await
            .unwrap();
        assert_eq!(found.map(|i| i.id), Some(invite.id));
    }

    #[tokio::test]
    async fn test_directory_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        let user = User {
            id: UserId::generate(),
            email: "parent@example.com".to_string(),
            display_name: "Parent".to_string(),
        };
        store.put_user(&user).await.unwrap();
        assert_eq!(
            store
                .find_user_by_email("PARENT@example.com")
                .await
                .unwrap(),
            Some(user.clone())
        );

        let doc = Document {
            id: DocumentId::generate(),
            document_type: DocumentType::MatchReport,
            created_by_id: user.id,
            team_id: Some(TeamId::generate()),
            body: ReportBody::Plain(
                json!({ "summary": "solid first half" })
                    .as_object()
                    .cloned()
                    .unwrap(),
            ),
            created_at: 42,
        };
        store.put_document(&doc).await.unwrap();
        assert_eq!(store.get_document(&doc.id).await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_team_security_round_trip() {
        let store = SqliteStore::open_memory().unwrap();
        let team = TeamId::generate();
        assert!(store.get_team_security(&team).await.unwrap().is_none());

        store
            .put_team_security(&team, &TeamSecurity::unlocked())
            .await
            .unwrap();
        assert_eq!(
            store.get_team_security(&team).await.unwrap(),
            Some(TeamSecurity::unlocked())
        );
    }

    #[tokio::test]
    async fn test_reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fieldbook.db");
        let share = PrivateShare::new(
            identity(
                UserId::generate(),
                ShareScope::All,
                Principal::User(UserId::generate()),
            ),
            7,
        );

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_share(&share).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_share(&share.id).await.unwrap(), Some(share));
    }
}
