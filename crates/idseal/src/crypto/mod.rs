//! Cryptographic primitives behind the identifier codec.
//!
//! This module is intentionally free of storage and HTTP dependencies.
//!
//! - [`key`]: base64 key loading with fail-fast length checks.
//! - [`cipher`]: AES-256-GCM-SIV with `nonce ‖ tag ‖ ciphertext` framing.
//! - [`fingerprint`]: deterministic SHA-256 / HMAC-SHA-256 fingerprints.

pub mod cipher;
pub mod fingerprint;
pub mod key;

pub use cipher::CipherError;
pub use fingerprint::Fingerprinter;
pub use key::{KeyError, KeyMaterial};

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;
