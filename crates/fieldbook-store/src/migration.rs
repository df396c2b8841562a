//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use fieldbook_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: directory records and team lock parameters.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE users (
            user_id BLOB PRIMARY KEY,            -- 16 bytes
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            display_name TEXT NOT NULL
        );

        CREATE TABLE family_members (
            member_id BLOB PRIMARY KEY,
            guardian_id BLOB NOT NULL,
            display_name TEXT NOT NULL
        );

        CREATE TABLE documents (
            document_id BLOB PRIMARY KEY,
            document_type TEXT NOT NULL,         -- 'match-report' | 'personal-scout'
            created_by_id BLOB NOT NULL,
            team_id BLOB,
            body TEXT NOT NULL,                  -- JSON, plaintext fields or {"crypto": ...}
            created_at INTEGER NOT NULL
        );

        -- Public lock parameters only; never key material
        CREATE TABLE team_security (
            team_id BLOB PRIMARY KEY,
            security TEXT NOT NULL               -- JSON TeamSecurity
        );

        CREATE INDEX idx_family_guardian ON family_members(guardian_id);
        CREATE INDEX idx_documents_creator ON documents(created_by_id, document_type);
        "#,
    )?;

    Ok(())
}

/// Migration v2: share grants and pending invites.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE private_shares (
            share_id BLOB PRIMARY KEY,
            owner_id BLOB NOT NULL,
            document_type TEXT NOT NULL,
            scope TEXT NOT NULL CHECK (scope IN ('one', 'all')),
            document_id BLOB,                    -- present iff scope = 'one'
            athlete_type TEXT NOT NULL CHECK (athlete_type IN ('user', 'family')),
            athlete_id BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,

            CHECK ((scope = 'one') = (document_id IS NOT NULL))
        );

        -- Grant uniqueness, enforced here and nowhere else
        CREATE UNIQUE INDEX ux_shares_one
            ON private_shares(document_type, document_id, athlete_type, athlete_id)
            WHERE scope = 'one';
        CREATE UNIQUE INDEX ux_shares_all
            ON private_shares(document_type, athlete_type, athlete_id)
            WHERE scope = 'all';

        CREATE INDEX idx_shares_recipient ON private_shares(athlete_type, athlete_id, document_type);
        CREATE INDEX idx_shares_owner ON private_shares(owner_id, document_type, scope);

        CREATE TABLE share_invites (
            invite_id BLOB PRIMARY KEY,
            owner_id BLOB NOT NULL,
            document_type TEXT NOT NULL,
            scope TEXT NOT NULL CHECK (scope IN ('one', 'all')),
            document_id BLOB,
            email TEXT NOT NULL COLLATE NOCASE,
            token TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            accepted_at INTEGER,

            CHECK ((scope = 'one') = (document_id IS NOT NULL))
        );

        CREATE INDEX idx_invites_owner ON share_invites(owner_id, document_type, scope, email);
        "#,
    )?;

    Ok(())
}
