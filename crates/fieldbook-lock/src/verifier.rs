//! Local password verification against the published verifier.
//!
//! A client fetches [`TeamSecurity`] once, derives the verifier from the
//! typed password and compares it locally. The password never leaves the
//! device and a wrong password never gets as far as decryption.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use fieldbook_core::{KdfParams, TeamSecurity};

use crate::error::{CryptoError, Result};
use crate::kdf::{derive_key, Salt, TeamKey};

/// Lock scheme version written to `encVersion`.
pub const LOCK_VERSION: u32 = 1;

/// 32-byte password verifier.
#[derive(Debug, Clone, Copy)]
pub struct Verifier([u8; 32]);

impl Verifier {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_b64(s: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|_| CryptoError::InvalidParameter("verifier"))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidParameter("verifier"))?;
        Ok(Self(arr))
    }

    pub fn to_b64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

// Constant-time comparison via blake3::Hash equality.
impl PartialEq for Verifier {
    fn eq(&self, other: &Self) -> bool {
        blake3::Hash::from(self.0) == blake3::Hash::from(other.0)
    }
}

impl Eq for Verifier {}

/// Create lock parameters for a new team password.
///
/// Returns the public [`TeamSecurity`] to store on the team and the derived
/// key so the creating client can encrypt immediately.
pub fn create_lock(password: &str, iterations: u32) -> Result<(TeamSecurity, TeamKey)> {
    if password.is_empty() {
        return Err(CryptoError::EmptyPassword);
    }

    let salt = Salt::generate();
    let key = derive_key(password, &salt, iterations)?;

    let security = TeamSecurity {
        lock_enabled: true,
        enc_version: LOCK_VERSION,
        kdf: KdfParams {
            salt_b64: salt.to_b64(),
            iterations,
        },
        verifier_b64: key.verifier().to_b64(),
    };

    Ok((security, key))
}

/// Derive the key for `password` and check it against the team's verifier.
///
/// Returns `Ok(None)` for a wrong password. Errors are reserved for lock
/// parameters this client cannot use.
pub fn unlock(password: &str, security: &TeamSecurity) -> Result<Option<TeamKey>> {
    if !security.lock_enabled {
        return Err(CryptoError::LockDisabled);
    }
    if security.enc_version != LOCK_VERSION {
        return Err(CryptoError::UnsupportedVersion(security.enc_version));
    }

    let salt = Salt::from_b64(&security.kdf.salt_b64)?;
    let expected = Verifier::from_b64(&security.verifier_b64)?;
    let key = derive_key(password, &salt, security.kdf.iterations)?;

    if key.verifier() == expected {
        Ok(Some(key))
    } else {
        Ok(None)
    }
}

/// Whether `password` unlocks the team.
pub fn verify_locally(password: &str, security: &TeamSecurity) -> Result<bool> {
    unlock(password, security).map(|key| key.is_some())
}
