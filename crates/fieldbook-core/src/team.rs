//! Team lock parameters and the opaque encrypted report body.
//!
//! Both are written by the report owner's client or by team settings and are
//! only ever transported by the server. Nothing in this module can decrypt.

use serde::{Deserialize, Serialize};

/// Password-based key derivation parameters published by a locked team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Random salt, standard base64.
    pub salt_b64: String,
    /// PBKDF2 iteration count.
    pub iterations: u32,
}

/// A team's lock settings, as served by `GET team-security`.
///
/// Carries everything a client needs to verify a password locally and
/// nothing that would let the server do so without the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSecurity {
    pub lock_enabled: bool,
    pub enc_version: u32,
    pub kdf: KdfParams,
    /// Verifier derived from the password, standard base64.
    pub verifier_b64: String,
}

impl TeamSecurity {
    /// Settings for a team that never enabled the lock.
    pub fn unlocked() -> Self {
        Self {
            lock_enabled: false,
            enc_version: 0,
            kdf: KdfParams {
                salt_b64: String::new(),
                iterations: 0,
            },
            verifier_b64: String::new(),
        }
    }
}

/// Versioned ciphertext of a report body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoEnvelope {
    /// Ciphertext including the authentication tag, standard base64.
    pub ciphertext_b64: String,
    /// Nonce, standard base64.
    pub iv_b64: String,
    pub version: u32,
}

/// The `{crypto: ...}` object attached to a team-locked report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedReportBody {
    pub crypto: CryptoEnvelope,
}
