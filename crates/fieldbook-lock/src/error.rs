//! Error types for the team lock.
//!
//! Messages never include passwords, keys or plaintext.

use thiserror::Error;

/// Errors from key derivation, verification and report decryption.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Team lock is not enabled, there is nothing to unlock.
    #[error("team lock is not enabled")]
    LockDisabled,

    /// Lock or envelope version this client does not understand.
    #[error("unsupported encryption version: {0}")]
    UnsupportedVersion(u32),

    /// Iteration count below the accepted floor.
    #[error("iteration count {got} is below the minimum of {min}")]
    IterationsTooLow { min: u32, got: u32 },

    /// Refused to create a lock from an empty password.
    #[error("password must not be empty")]
    EmptyPassword,

    /// Malformed base64 or wrong-length parameter.
    #[error("invalid {0}")]
    InvalidParameter(&'static str),

    /// Authentication failed: wrong key or corrupted ciphertext.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    /// Decryption succeeded but the body is not a JSON object.
    #[error("decrypted report body is malformed")]
    MalformedPlaintext,
}

/// Result type for lock operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
