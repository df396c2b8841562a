//! # Fieldbook Lock
//!
//! Client-side team lock: the server never sees a team password, a derived
//! key, or the plaintext of a locked report.
//!
//! ## Key Model
//!
//! ```text
//! password --PBKDF2-HMAC-SHA256(salt, iterations)--> TeamKey
//! TeamKey  --BLAKE3 derive_key("...report key")----> ReportKey (ChaCha20-Poly1305)
//! TeamKey  --BLAKE3 derive_key("...verifier")------> Verifier (published)
//! ```
//!
//! The verifier is published in [`TeamSecurity`](fieldbook_core::TeamSecurity)
//! so a client can check a password without any round trip, and it reveals
//! nothing about the report key.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fieldbook_lock::{create_lock, unlock, ReportCipher};
//!
//! let (security, _key) = create_lock("correct horse", 200_000).unwrap();
//!
//! // Later, on another device:
//! if let Some(key) = unlock("correct horse", &security).unwrap() {
//!     let cipher = ReportCipher::new(key.report_key());
//!     // let report = cipher.decrypt(&fetched_body)?;
//! }
//! ```

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod session;
pub mod verifier;

pub use cipher::{
    DecryptedReport, EncryptionShape, ReportCipher, ReportKey, ShapeKind, ENVELOPE_VERSION,
};
pub use error::{CryptoError, Result};
pub use kdf::{derive_key, Salt, TeamKey, DEFAULT_ITERATIONS, MIN_ITERATIONS};
pub use session::SessionKeyCache;
pub use verifier::{create_lock, unlock, verify_locally, Verifier, LOCK_VERSION};
