//! Per-session cache of unlocked team keys.
//!
//! Holds derived keys, never passwords, so a user is prompted once per team
//! per session. Must be cleared when the session ends.

use std::collections::HashMap;
use std::sync::RwLock;

use fieldbook_core::TeamId;

use crate::kdf::TeamKey;

/// Team keys unlocked during the current session.
#[derive(Debug, Default)]
pub struct SessionKeyCache {
    keys: RwLock<HashMap<TeamId, TeamKey>>,
}

impl SessionKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, team: &TeamId) -> Option<TeamKey> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys.get(team).cloned()
    }

    pub fn insert(&self, team: TeamId, key: TeamKey) {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        keys.insert(team, key);
    }

    /// Forget one team, e.g. after its password changed.
    pub fn forget(&self, team: &TeamId) -> bool {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        keys.remove(team).is_some()
    }

    /// Drop every cached key. Call on logout.
    pub fn clear(&self) {
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
