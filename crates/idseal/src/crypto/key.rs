//! [`KeyMaterial`]: fixed-size secret key buffer decoded from configuration.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use super::KEY_LEN;

/// Errors produced while loading key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    /// No key was configured.
    #[error("key is missing")]
    Missing,

    /// The configured value is not valid standard base64.
    #[error("key is not valid base64")]
    InvalidEncoding,

    /// The decoded key material has an unexpected length.
    #[error("key has invalid length: expected {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Fixed-size key buffer that holds exactly [`KEY_LEN`] bytes.
///
/// When this type is dropped, the memory is overwritten with zeroes to
/// minimise the window during which plaintext key material lives in RAM.
#[derive(Clone)]
pub struct KeyMaterial(Box<[u8; KEY_LEN]>);

impl KeyMaterial {
    /// Decode a base64-encoded 256-bit key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Missing`] for blank input, [`KeyError::InvalidEncoding`]
    /// if the input is not base64, and [`KeyError::InvalidLength`] unless the
    /// decoded length is exactly [`KEY_LEN`].
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Err(KeyError::Missing);
        }
        let mut decoded = STANDARD
            .decode(encoded)
            .map_err(|_| KeyError::InvalidEncoding)?;
        let result = Self::from_slice(&decoded);
        decoded.iter_mut().for_each(|b| *b = 0);
        result
    }

    /// Copy raw key bytes into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] if the slice has the wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyError::InvalidLength(bytes.len()));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material — not even in debug builds.
        f.write_str("KeyMaterial([REDACTED])")
    }
}
