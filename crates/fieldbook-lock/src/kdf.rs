//! Password-based key derivation.
//!
//! The team password is stretched with PBKDF2-HMAC-SHA256 into a 32-byte
//! [`TeamKey`]. Subkeys are split off with BLAKE3 in key-derivation mode so
//! the published verifier and the report key are independent.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use sha2::Sha256;

use crate::cipher::ReportKey;
use crate::error::{CryptoError, Result};
use crate::verifier::Verifier;

/// Iterations used when creating a new lock.
pub const DEFAULT_ITERATIONS: u32 = 210_000;

/// Lowest iteration count accepted when creating or unlocking a lock.
pub const MIN_ITERATIONS: u32 = 10_000;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

const REPORT_KEY_CONTEXT: &str = "fieldbook-lock v1 report key";
const VERIFIER_CONTEXT: &str = "fieldbook-lock v1 verifier";

/// Random per-team salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Generate a new random salt.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parse the `saltB64` published in team security.
    pub fn from_b64(s: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(s)
            .map_err(|_| CryptoError::InvalidParameter("salt"))?;
        if bytes.is_empty() {
            return Err(CryptoError::InvalidParameter("salt"));
        }
        Ok(Self(bytes))
    }

    pub fn to_b64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Key stretched from the team password.
///
/// This is what a session caches after a successful unlock; the password
/// itself is dropped as soon as derivation finishes.
#[derive(Clone, PartialEq, Eq)]
pub struct TeamKey([u8; 32]);

impl TeamKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Key that seals report bodies.
    pub fn report_key(&self) -> ReportKey {
        ReportKey::from_bytes(blake3::derive_key(REPORT_KEY_CONTEXT, &self.0))
    }

    /// Verifier published alongside the lock parameters.
    pub fn verifier(&self) -> Verifier {
        Verifier::from_bytes(blake3::derive_key(VERIFIER_CONTEXT, &self.0))
    }
}

impl fmt::Debug for TeamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TeamKey(<redacted>)")
    }
}

/// Derive the team key from a password, salt and iteration count.
///
/// Deterministic: the same inputs always give the same key. CPU-bound, so
/// async callers should run it on a blocking thread.
pub fn derive_key(password: &str, salt: &Salt, iterations: u32) -> Result<TeamKey> {
    if iterations < MIN_ITERATIONS {
        return Err(CryptoError::IterationsTooLow {
            min: MIN_ITERATIONS,
            got: iterations,
        });
    }

    let mut out = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    Ok(TeamKey(out))
}
