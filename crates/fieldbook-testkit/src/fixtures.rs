//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use serde_json::{Map, Value};

use fieldbook_core::{
    now_millis, Document, DocumentId, DocumentType, FamilyMember, FamilyMemberId, ReportBody,
    TeamId, TeamSecurity, User, UserId,
};
use fieldbook_lock::{create_lock, ReportCipher, TeamKey, MIN_ITERATIONS};
use fieldbook_sharing::{GrantStore, NotificationDispatcher, SharingConfig};
use fieldbook_store::{MemoryStore, Store};

/// A memory store with helpers to seed directory records.
///
/// Helpers panic on store errors; they are meant for tests only.
pub struct TestFixture {
    pub store: Arc<MemoryStore>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Grant store over this fixture's store with logging channels.
    pub fn grants(&self, config: SharingConfig) -> GrantStore<MemoryStore> {
        let dispatcher = NotificationDispatcher::logging(config.dispatch_wait);
        GrantStore::new(Arc::clone(&self.store), dispatcher, config)
    }

    /// Create a user. `name` becomes the local part of their email, so it
    /// must be unique within the fixture.
    pub async fn user(&self, name: &str) -> User {
        let user = User {
            id: UserId::generate(),
            email: format!("{}@example.com", name),
            display_name: name.to_string(),
        };
        self.store.put_user(&user).await.expect("put user");
        user
    }

    /// Create a family member managed by `guardian`.
    pub async fn family_member(&self, guardian: UserId, name: &str) -> FamilyMember {
        let member = FamilyMember {
            id: FamilyMemberId::generate(),
            guardian_id: guardian,
            display_name: name.to_string(),
        };
        self.store
            .put_family_member(&member)
            .await
            .expect("put family member");
        member
    }

    /// Create a plaintext match report.
    pub async fn match_report(&self, owner: UserId, summary: &str) -> Document {
        self.document(
            owner,
            DocumentType::MatchReport,
            None,
            ReportBody::Plain(report_fields(summary)),
        )
        .await
    }

    /// Create a plaintext personal scouting report.
    pub async fn personal_scout(&self, owner: UserId, summary: &str) -> Document {
        self.document(
            owner,
            DocumentType::PersonalScout,
            None,
            ReportBody::Plain(report_fields(summary)),
        )
        .await
    }

    /// Create a team lock with the lowest accepted iteration count and
    /// publish it. Returns the team key as the creating client holds it.
    pub async fn locked_team(&self, password: &str) -> (TeamId, TeamSecurity, TeamKey) {
        let team = TeamId::generate();
        let (security, key) = create_lock(password, MIN_ITERATIONS).expect("create lock");
        self.store
            .put_team_security(&team, &security)
            .await
            .expect("put team security");
        (team, security, key)
    }

    /// Create a match report encrypted under `key`.
    pub async fn locked_report(
        &self,
        owner: UserId,
        team: TeamId,
        key: &TeamKey,
        summary: &str,
    ) -> Document {
        let body = ReportCipher::new(key.report_key())
            .encrypt(&report_fields(summary))
            .expect("encrypt report");
        self.document(
            owner,
            DocumentType::MatchReport,
            Some(team),
            ReportBody::Encrypted(body),
        )
        .await
    }

    async fn document(
        &self,
        owner: UserId,
        document_type: DocumentType,
        team_id: Option<TeamId>,
        body: ReportBody,
    ) -> Document {
        let document = Document {
            id: DocumentId::generate(),
            document_type,
            created_by_id: owner,
            team_id,
            body,
            created_at: now_millis(),
        };
        self.store
            .put_document(&document)
            .await
            .expect("put document");
        document
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fixture seeded with `count` users named `user-0`, `user-1`, ...
pub async fn multi_party_fixture(count: usize) -> (TestFixture, Vec<User>) {
    let fixture = TestFixture::new();
    let mut users = Vec::with_capacity(count);
    for i in 0..count {
        users.push(fixture.user(&format!("user-{}", i)).await);
    }
    (fixture, users)
}

/// Report fields with a summary and a fixed rating.
pub fn report_fields(summary: &str) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("summary".to_string(), Value::String(summary.to_string()));
    fields.insert("rating".to_string(), Value::from(7));
    fields
}
