//! Lexical form of a stored protected identifier.
//!
//! ```text
//! <fingerprint>:<base64(nonce ‖ tag ‖ ciphertext)>
//! ```
//!
//! Anything without the delimiter is a legacy plaintext value written before
//! sealing was introduced. There is no schema-level marker; the delimiter is
//! the only distinction.

use std::fmt;

/// Separator between the fingerprint and payload segments.
pub const DELIMITER: char = ':';

/// A sealed identifier as persisted in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedEnvelope {
    /// Hex fingerprint of the plaintext.
    pub fingerprint: String,
    /// Standard base64 of `nonce ‖ tag ‖ ciphertext`.
    pub payload: String,
}

impl fmt::Display for SealedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{DELIMITER}{}", self.fingerprint, self.payload)
    }
}

/// Classification of a raw stored string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredValue<'a> {
    /// Empty string: nothing was stored.
    Empty,
    /// No delimiter: pre-migration plaintext.
    Legacy(&'a str),
    /// Split at the first delimiter. Either segment may be empty.
    Sealed {
        /// Segment before the delimiter.
        fingerprint: &'a str,
        /// Segment after the delimiter.
        payload: &'a str,
    },
}

impl<'a> StoredValue<'a> {
    /// Classify `raw` by the presence of [`DELIMITER`].
    pub fn classify(raw: &'a str) -> Self {
        if raw.is_empty() {
            return Self::Empty;
        }
        match raw.split_once(DELIMITER) {
            Some((fingerprint, payload)) => Self::Sealed {
                fingerprint,
                payload,
            },
            None => Self::Legacy(raw),
        }
    }
}

/// Prefix shared by every envelope sealed from a plaintext with this fingerprint.
pub fn lookup_prefix(fingerprint: &str) -> String {
    format!("{fingerprint}{DELIMITER}")
}
