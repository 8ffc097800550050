//! Sealed identifier codec.
//!
//! Seals a plaintext identifier into `<fingerprint>:<payload>` and opens it
//! back, verifying both the AEAD tag and the fingerprint/payload pairing.
//!
//! # Failure policy
//!
//! [`IdentifierCodec::open`] is fail-closed: a malformed envelope, an
//! authentication failure, and a fingerprint mismatch all log an error and
//! yield `None`. Callers that must tell these apart from ordinary absence
//! (security monitoring, migration tooling) use [`IdentifierCodec::try_open`].
//!
//! # Invariants
//!
//! - Plaintext, payload bytes, and key material never appear in log fields.
//! - `None` and `""` are never sealed; protecting "nothing" is a no-op.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;
use tracing::error;

use crate::config::Config;
use crate::crypto::{cipher, CipherError, Fingerprinter, KeyError, KeyMaterial};
use crate::envelope::{SealedEnvelope, StoredValue};

/// Errors produced while sealing.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The AEAD layer refused to encrypt.
    #[error("sealing failed: {0}")]
    Seal(#[from] CipherError),
}

/// Why a stored envelope could not be trusted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OpenError {
    /// The envelope could not be parsed: missing payload, invalid base64,
    /// too short to hold a nonce and tag, or non-UTF-8 plaintext.
    #[error("malformed envelope: {0}")]
    Malformed(&'static str),

    /// AEAD authentication failed: wrong key or modified bytes.
    #[error("envelope failed authentication")]
    Authentication,

    /// The payload decrypted but its plaintext does not hash to the stored fingerprint.
    #[error("fingerprint does not match decrypted payload")]
    IntegrityMismatch,
}

impl OpenError {
    /// Stable label for the `reason` log field.
    pub fn reason(&self) -> &'static str {
        match self {
            OpenError::Malformed(_) => "malformed",
            OpenError::Authentication => "authentication",
            OpenError::IntegrityMismatch => "integrity_mismatch",
        }
    }
}

/// Where an opened plaintext came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOrigin {
    /// The stored value was empty.
    Empty,
    /// Pre-migration plaintext; no integrity check was possible.
    Legacy,
    /// A verified sealed envelope.
    Sealed,
}

/// A successfully opened stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    /// Recovered identifier.
    pub plaintext: String,
    /// How the stored value was interpreted.
    pub origin: ValueOrigin,
}

/// Seals and opens protected identifiers under one configured key.
///
/// Holds no mutable state; share it behind an `Arc` across tasks.
#[derive(Debug)]
pub struct IdentifierCodec {
    key: KeyMaterial,
    fingerprinter: Fingerprinter,
}

impl IdentifierCodec {
    /// Build a codec from a base64-encoded 256-bit key.
    ///
    /// # Errors
    ///
    /// Fails if the key is absent, not base64, or not exactly 32 bytes once
    /// decoded. There is no degraded mode.
    pub fn new(encryption_key_b64: &str, fingerprinter: Fingerprinter) -> Result<Self, KeyError> {
        Ok(Self {
            key: KeyMaterial::from_base64(encryption_key_b64)?,
            fingerprinter,
        })
    }

    /// Build a codec from validated service configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending variable if either key is invalid.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let fingerprinter = match cfg.fingerprint_key.as_deref() {
            Some(encoded) => {
                let key = KeyMaterial::from_base64(encoded).context("FINGERPRINT_KEY is invalid")?;
                Fingerprinter::keyed(&key).context("FINGERPRINT_KEY is invalid")?
            }
            None => Fingerprinter::Sha256,
        };
        Self::new(&cfg.id_encryption_key, fingerprinter).context("ID_ENCRYPTION_KEY is invalid")
    }

    /// Fingerprint mode in effect (`"sha256"` or `"hmac-sha256"`).
    pub fn fingerprint_mode(&self) -> &'static str {
        self.fingerprinter.mode()
    }

    /// Deterministic fingerprint of a candidate plaintext, for lookups only.
    pub fn fingerprint(&self, plaintext: &str) -> String {
        self.fingerprinter.compute(plaintext)
    }

    /// Seal an optional identifier. `None` and `Some("")` are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Seal`] if the AEAD layer fails.
    pub fn seal(&self, plaintext: Option<&str>) -> Result<Option<String>, CodecError> {
        plaintext.map(|p| self.seal_value(p)).transpose()
    }

    /// Seal a present identifier. An empty string is returned unchanged.
    ///
    /// Every call draws a fresh nonce, so repeated seals of the same value
    /// differ in payload but share the fingerprint prefix.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Seal`] if the AEAD layer fails.
    pub fn seal_value(&self, plaintext: &str) -> Result<String, CodecError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let framed = cipher::seal_bytes(&self.key, plaintext.as_bytes())?;
        let envelope = SealedEnvelope {
            fingerprint: self.fingerprint(plaintext),
            payload: STANDARD.encode(framed),
        };
        Ok(envelope.to_string())
    }

    /// Open a stored value, fail-closed.
    ///
    /// Returns the plaintext for sealed and legacy values, passes `None` and
    /// `""` through unchanged, and returns `None` (after logging) for anything
    /// that cannot be trusted.
    pub fn open(&self, stored: Option<&str>) -> Option<String> {
        let stored = stored?;
        self.try_open(stored).ok().map(|opened| opened.plaintext)
    }

    /// Open a stored value, reporting why it could not be trusted.
    ///
    /// Failures are logged here, so [`IdentifierCodec::open`] does not log again.
    ///
    /// # Errors
    ///
    /// Returns an [`OpenError`] for malformed, unauthenticated, or mismatched envelopes.
    pub fn try_open(&self, stored: &str) -> Result<Opened, OpenError> {
        let result = match StoredValue::classify(stored) {
            StoredValue::Empty => Ok(Opened {
                plaintext: String::new(),
                origin: ValueOrigin::Empty,
            }),
            StoredValue::Legacy(plaintext) => Ok(Opened {
                plaintext: plaintext.to_owned(),
                origin: ValueOrigin::Legacy,
            }),
            StoredValue::Sealed {
                fingerprint,
                payload,
            } => self.open_envelope(fingerprint, payload).map(|plaintext| Opened {
                plaintext,
                origin: ValueOrigin::Sealed,
            }),
        };
        if let Err(e) = &result {
            error!(reason = e.reason(), error = %e, "sealed identifier could not be opened");
        }
        result
    }

    /// Returns `true` if `stored` has the sealed envelope form.
    pub fn is_sealed(stored: &str) -> bool {
        matches!(StoredValue::classify(stored), StoredValue::Sealed { .. })
    }

    /// Returns `true` only if `stored` is an envelope this codec can open and
    /// verify. Unlike [`IdentifierCodec::try_open`], failures are not logged.
    pub fn opens_as_sealed(&self, stored: &str) -> bool {
        match StoredValue::classify(stored) {
            StoredValue::Sealed {
                fingerprint,
                payload,
            } => self.open_envelope(fingerprint, payload).is_ok(),
            _ => false,
        }
    }

    fn open_envelope(&self, fingerprint: &str, payload: &str) -> Result<String, OpenError> {
        if payload.is_empty() {
            return Err(OpenError::Malformed("missing payload"));
        }
        let framed = STANDARD
            .decode(payload)
            .map_err(|_| OpenError::Malformed("payload is not base64"))?;

        let bytes = cipher::open_bytes(&self.key, &framed).map_err(|e| match e {
            CipherError::Truncated(_) => OpenError::Malformed("payload truncated"),
            CipherError::AeadFailure => OpenError::Authentication,
        })?;

        let plaintext =
            String::from_utf8(bytes).map_err(|_| OpenError::Malformed("plaintext is not UTF-8"))?;

        if self.fingerprint(&plaintext) != fingerprint {
            return Err(OpenError::IntegrityMismatch);
        }
        Ok(plaintext)
    }
}
