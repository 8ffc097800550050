//! Deterministic fingerprints of plaintext identifiers.
//!
//! A fingerprint is always 64 lowercase hex characters. The default mode is a
//! bare SHA-256 digest; configuring a fingerprint key switches to
//! HMAC-SHA-256, which keeps leaked fingerprints from being reversed by
//! enumerating the (small) identifier space. The mode must not change once
//! sealed data exists, since every stored fingerprint depends on it.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::{KeyError, KeyMaterial};

type HmacSha256 = Hmac<Sha256>;

/// Hex length of every fingerprint.
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Computes the deterministic fingerprint used for uniqueness lookups.
#[derive(Clone, Default)]
pub enum Fingerprinter {
    /// `hex(SHA-256(plaintext))`.
    #[default]
    Sha256,
    /// `hex(HMAC-SHA-256(key, plaintext))`. The MAC is keyed once and cloned per call.
    HmacSha256(HmacSha256),
}

impl Fingerprinter {
    /// Build a keyed fingerprinter.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if the MAC rejects the key, which
    /// HMAC never does for a [`KeyMaterial`].
    pub fn keyed(key: &KeyMaterial) -> Result<Self, KeyError> {
        HmacSha256::new_from_slice(key.as_bytes())
            .map(Self::HmacSha256)
            .map_err(|_| KeyError::InvalidLength(key.as_bytes().len()))
    }

    /// Fingerprint `plaintext`.
    pub fn compute(&self, plaintext: &str) -> String {
        match self {
            Self::Sha256 => hex::encode(Sha256::digest(plaintext.as_bytes())),
            Self::HmacSha256(mac) => {
                let mut mac = mac.clone();
                mac.update(plaintext.as_bytes());
                hex::encode(mac.finalize().into_bytes())
            }
        }
    }

    /// Short name reported by the health endpoint.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::HmacSha256(_) => "hmac-sha256",
        }
    }
}

impl std::fmt::Debug for Fingerprinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprinter({})", self.mode())
    }
}
