//! Client-side team unlock flow.
//!
//! A user types the team password once per session. The key is derived on a
//! blocking thread, checked against the team's published verifier, and kept
//! in a [`SessionKeyCache`]. Reports of that team can then be sealed and
//! opened locally until [`TeamUnlocker::logout`].

use std::sync::Arc;

use serde_json::{Map, Value};

use fieldbook_core::{Document, EncryptedReportBody, TeamId, TeamSecurity};
use fieldbook_lock::{
    create_lock, unlock, CryptoError, DecryptedReport, EncryptionShape, ReportCipher,
    SessionKeyCache, ShapeKind,
};

use crate::config::LockConfig;
use crate::error::{FieldbookError, Result};

/// Unlocks teams and reads or writes their locked reports.
#[derive(Debug, Clone)]
pub struct TeamUnlocker {
    keys: Arc<SessionKeyCache>,
    config: LockConfig,
}

impl TeamUnlocker {
    pub fn new(config: LockConfig) -> Self {
        Self {
            keys: Arc::new(SessionKeyCache::new()),
            config,
        }
    }

    pub fn is_unlocked(&self, team: &TeamId) -> bool {
        self.keys.get(team).is_some()
    }

    /// Check `password` against the team's verifier and cache the key.
    ///
    /// Returns `Ok(false)` for a wrong password. Nothing is decrypted on
    /// that path.
    pub async fn unlock(
        &self,
        team: TeamId,
        security: &TeamSecurity,
        password: &str,
    ) -> Result<bool> {
        if !security.lock_enabled {
            return Err(CryptoError::LockDisabled.into());
        }
        if security.kdf.iterations < self.config.min_iterations {
            return Err(CryptoError::IterationsTooLow {
                min: self.config.min_iterations,
                got: security.kdf.iterations,
            }
            .into());
        }

        let security = security.clone();
        let password = password.to_string();
        let key = tokio::task::spawn_blocking(move || unlock(&password, &security))
            .await
            .map_err(|e| FieldbookError::Task(e.to_string()))??;

        match key {
            Some(key) => {
                self.keys.insert(team, key);
                tracing::debug!(team = %team, "team unlocked");
                Ok(true)
            }
            None => {
                tracing::debug!(team = %team, "team unlock rejected");
                Ok(false)
            }
        }
    }

    /// Create lock parameters for `team` and unlock it in this session.
    ///
    /// The returned [`TeamSecurity`] is what team settings publish.
    pub async fn create_lock(&self, team: TeamId, password: &str) -> Result<TeamSecurity> {
        let iterations = self.config.default_iterations;
        let password = password.to_string();
        let (security, key) =
            tokio::task::spawn_blocking(move || create_lock(&password, iterations))
                .await
                .map_err(|e| FieldbookError::Task(e.to_string()))??;

        self.keys.insert(team, key);
        tracing::info!(team = %team, iterations, "team lock created");
        Ok(security)
    }

    /// Encrypt report fields for an unlocked team.
    pub fn seal(&self, team: &TeamId, fields: &Map<String, Value>) -> Result<EncryptedReportBody> {
        Ok(self.cipher(team)?.encrypt(fields)?)
    }

    /// Read a fetched report.
    ///
    /// Plaintext bodies need no key. Anything encrypted needs its team to be
    /// unlocked in this session.
    pub fn open(&self, document: &Document) -> Result<DecryptedReport> {
        let shape = EncryptionShape::resolve(&document.body);

        if let EncryptionShape::Plaintext(fields) = shape {
            return Ok(DecryptedReport {
                fields,
                shape: ShapeKind::Plaintext,
            });
        }

        let team = document.team_id.ok_or_else(|| {
            FieldbookError::Locked(format!("report {} has no team", document.id))
        })?;
        Ok(self.cipher(&team)?.decrypt_shape(&shape)?)
    }

    /// Forget one team's key.
    pub fn lock(&self, team: &TeamId) -> bool {
        self.keys.forget(team)
    }

    /// Drop every cached key.
    pub fn logout(&self) {
        self.keys.clear();
        tracing::debug!("session keys cleared");
    }

    fn cipher(&self, team: &TeamId) -> Result<ReportCipher> {
        self.keys
            .get(team)
            .map(|key| ReportCipher::new(key.report_key()))
            .ok_or_else(|| FieldbookError::Locked(team.to_string()))
    }
}

impl Default for TeamUnlocker {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldbook_core::{DocumentId, DocumentType, ReportBody, UserId};
    use fieldbook_lock::MIN_ITERATIONS;
    use serde_json::json;

    fn fast() -> TeamUnlocker {
        TeamUnlocker::new(LockConfig::default().with_default_iterations(MIN_ITERATIONS))
    }

    fn fields() -> Map<String, Value> {
        json!({ "summary": "pressed well", "rating": 7 })
            .as_object()
            .cloned()
            .unwrap()
    }

    fn document(team: Option<TeamId>, body: ReportBody) -> Document {
        Document {
            id: DocumentId::generate(),
            document_type: DocumentType::MatchReport,
            created_by_id: UserId::generate(),
            team_id: team,
            body,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_unlock_then_open() {
        let author = fast();
        let team = TeamId::generate();
        let security = author.create_lock(team, "touchline").await.unwrap();
        let sealed = author.seal(&team, &fields()).unwrap();

        let reader = fast();
        let doc = document(Some(team), ReportBody::Encrypted(sealed));
        assert!(matches!(reader.open(&doc), Err(FieldbookError::Locked(_))));

        assert!(!reader.unlock(team, &security, "sideline").await.unwrap());
        assert!(!reader.is_unlocked(&team));

        assert!(reader.unlock(team, &security, "touchline").await.unwrap());
        let report = reader.open(&doc).unwrap();
        assert_eq!(report.fields, fields());
        assert_eq!(report.shape, ShapeKind::FullBody);
    }

    #[tokio::test]
    async fn test_logout_clears_keys() {
        let unlocker = fast();
        let team = TeamId::generate();
        unlocker.create_lock(team, "pw").await.unwrap();
        assert!(unlocker.is_unlocked(&team));

        unlocker.logout();
        assert!(!unlocker.is_unlocked(&team));
        assert!(matches!(
            unlocker.seal(&team, &fields()),
            Err(FieldbookError::Locked(_))
        ));
    }

    #[tokio::test]
    async fn test_plaintext_needs_no_key() {
        let unlocker = fast();
        let doc = document(None, ReportBody::Plain(fields()));
        let report = unlocker.open(&doc).unwrap();
        assert_eq!(report.shape, ShapeKind::Plaintext);
        assert_eq!(report.fields, fields());
    }

    #[tokio::test]
    async fn test_weak_team_parameters_rejected() {
        let unlocker = TeamUnlocker::new(LockConfig::default().with_min_iterations(50_000));
        let team = TeamId::generate();
        let security = fast().create_lock(team, "pw").await.unwrap();

        let err = unlocker.unlock(team, &security, "pw").await.unwrap_err();
        assert!(matches!(
            err,
            FieldbookError::Crypto(CryptoError::IterationsTooLow { .. })
        ));
    }

    #[tokio::test]
    async fn test_disabled_lock() {
        let unlocker = fast();
        let err = unlocker
            .unlock(TeamId::generate(), &TeamSecurity::unlocked(), "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, FieldbookError::Crypto(CryptoError::LockDisabled)));
    }
}
