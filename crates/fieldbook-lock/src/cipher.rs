//! Report body encryption.
//!
//! A locked report's sensitive fields are serialized as one JSON object and
//! sealed with ChaCha20-Poly1305 into a versioned [`CryptoEnvelope`].
//!
//! Older reports predate full-body encryption and only encrypted their
//! `notes` field, and some predate encryption altogether. The stored shape is
//! resolved once into an [`EncryptionShape`] and each shape has exactly one
//! decryption path.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::Deserialize;
use serde_json::{Map, Value};

use fieldbook_core::{CryptoEnvelope, EncryptedReportBody, ReportBody};

use crate::error::{CryptoError, Result};

/// Envelope format version: ChaCha20-Poly1305, 96-bit nonce, JSON body.
pub const ENVELOPE_VERSION: u32 = 1;

/// Field that legacy reports encrypted on its own.
pub const LEGACY_NOTES_FIELD: &str = "notes";

const NONCE_LEN: usize = 12;

/// 256-bit key for report bodies.
#[derive(Clone)]
pub struct ReportKey([u8; 32]);

impl ReportKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn seal(&self, plaintext: &[u8]) -> Result<CryptoEnvelope> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(CryptoEnvelope {
            ciphertext_b64: STANDARD.encode(ciphertext),
            iv_b64: STANDARD.encode(nonce),
            version: ENVELOPE_VERSION,
        })
    }

    fn open(&self, sealed: &Sealed) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        cipher
            .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

impl fmt::Debug for ReportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReportKey(<redacted>)")
    }
}

/// A decoded envelope: ciphertext and nonce as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
}

impl Sealed {
    fn decode(envelope: &CryptoEnvelope) -> Result<Self> {
        if envelope.version != ENVELOPE_VERSION {
            return Err(CryptoError::UnsupportedVersion(envelope.version));
        }
        Self::decode_parts(&envelope.ciphertext_b64, &envelope.iv_b64)
    }

    fn decode_parts(ciphertext_b64: &str, iv_b64: &str) -> Result<Self> {
        let nonce: [u8; NONCE_LEN] = STANDARD
            .decode(iv_b64)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or(CryptoError::InvalidParameter("iv"))?;
        let ciphertext = STANDARD
            .decode(ciphertext_b64)
            .map_err(|_| CryptoError::InvalidParameter("ciphertext"))?;
        Ok(Self { nonce, ciphertext })
    }
}

/// Legacy encrypted notes value: `{"ciphertextB64": ..., "ivB64": ...}`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyNotes {
    ciphertext_b64: String,
    iv_b64: String,
}

/// How a stored report body is protected.
#[derive(Debug, Clone, PartialEq)]
pub enum EncryptionShape {
    /// The whole sensitive body is one envelope.
    FullBody(CryptoEnvelope),
    /// Plaintext fields except an encrypted `notes` field.
    NotesOnly { fields: Map<String, Value>, notes: Sealed },
    /// Nothing is encrypted.
    Plaintext(Map<String, Value>),
}

/// Discriminator of [`EncryptionShape`], reported with decrypted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    FullBody,
    NotesOnly,
    Plaintext,
}

impl EncryptionShape {
    /// Classify a fetched report body.
    ///
    /// A `notes` value that is not a well-formed encrypted object is taken
    /// as plaintext: historical reports may predate encryption.
    pub fn resolve(body: &ReportBody) -> Self {
        match body {
            ReportBody::Encrypted(EncryptedReportBody { crypto }) => {
                EncryptionShape::FullBody(crypto.clone())
            }
            ReportBody::Plain(fields) => {
                let notes = fields
                    .get(LEGACY_NOTES_FIELD)
                    .filter(|v| v.is_object())
                    .and_then(|v| LegacyNotes::deserialize(v).ok())
                    .and_then(|n| Sealed::decode_parts(&n.ciphertext_b64, &n.iv_b64).ok());

                match notes {
                    Some(notes) => EncryptionShape::NotesOnly {
                        fields: fields.clone(),
                        notes,
                    },
                    None => EncryptionShape::Plaintext(fields.clone()),
                }
            }
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            EncryptionShape::FullBody(_) => ShapeKind::FullBody,
            EncryptionShape::NotesOnly { .. } => ShapeKind::NotesOnly,
            EncryptionShape::Plaintext(_) => ShapeKind::Plaintext,
        }
    }

    /// Whether reading this shape needs a key.
    pub fn needs_key(&self) -> bool {
        !matches!(self, EncryptionShape::Plaintext(_))
    }
}

/// Plaintext report fields and the shape they were recovered from.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedReport {
    pub fields: Map<String, Value>,
    pub shape: ShapeKind,
}

/// Encrypts and decrypts report bodies with one team's key.
#[derive(Debug, Clone)]
pub struct ReportCipher {
    key: ReportKey,
}

impl ReportCipher {
    pub fn new(key: ReportKey) -> Self {
        Self { key }
    }

    /// Seal report fields into an encrypted body.
    pub fn encrypt(&self, fields: &Map<String, Value>) -> Result<EncryptedReportBody> {
        let plaintext =
            serde_json::to_vec(fields).map_err(|_| CryptoError::EncryptionFailed)?;
        Ok(EncryptedReportBody {
            crypto: self.key.seal(&plaintext)?,
        })
    }

    /// Decrypt a full-body envelope.
    ///
    /// Fails with [`CryptoError::DecryptionFailed`] on any authentication
    /// failure; no partial plaintext is ever returned.
    pub fn decrypt_envelope(&self, envelope: &CryptoEnvelope) -> Result<Map<String, Value>> {
        let sealed = Sealed::decode(envelope)?;
        let plaintext = self.key.open(&sealed)?;
        match serde_json::from_slice::<Value>(&plaintext) {
            Ok(Value::Object(fields)) => Ok(fields),
            _ => Err(CryptoError::MalformedPlaintext),
        }
    }

    /// Decrypt a resolved shape.
    pub fn decrypt_shape(&self, shape: &EncryptionShape) -> Result<DecryptedReport> {
        let fields = match shape {
            EncryptionShape::FullBody(envelope) => self.decrypt_envelope(envelope)?,
            EncryptionShape::NotesOnly { fields, notes } => {
                let plaintext = self.key.open(notes)?;
                let notes =
                    String::from_utf8(plaintext).map_err(|_| CryptoError::MalformedPlaintext)?;
                let mut fields = fields.clone();
                fields.insert(LEGACY_NOTES_FIELD.to_string(), Value::String(notes));
                fields
            }
            EncryptionShape::Plaintext(fields) => fields.clone(),
        };

        Ok(DecryptedReport {
            fields,
            shape: shape.kind(),
        })
    }

    /// Resolve and decrypt a fetched report body.
    pub fn decrypt(&self, body: &ReportBody) -> Result<DecryptedReport> {
        self.decrypt_shape(&EncryptionShape::resolve(body))
    }

    /// Encrypt a single notes value the way legacy reports stored it.
    pub fn encrypt_legacy_notes(&self, notes: &str) -> Result<Value> {
        let envelope = self.key.seal(notes.as_bytes())?;
        Ok(serde_json::json!({
            "ciphertextB64": envelope.ciphertext_b64,
            "ivB64": envelope.iv_b64,
        }))
    }
}
