//! AES-256-GCM-SIV encryption and decryption of identifier bytes.
//!
//! Output framing is `nonce ‖ tag ‖ ciphertext`. The tag is produced detached
//! and written ahead of the ciphertext so that the framing matches envelopes
//! written by earlier deployments.
//!
//! A fresh random nonce is drawn for every call, so sealing the same plaintext
//! twice never yields the same bytes. Equality lookups go through the
//! fingerprint instead (see [`super::fingerprint`]).

use aes_gcm_siv::{
    aead::{AeadInPlace, KeyInit, OsRng},
    Aes256GcmSiv, Nonce, Tag,
};
use thiserror::Error;

use super::KeyMaterial;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of an AES-GCM-SIV authentication tag (16 bytes = 128 bits).
pub const TAG_LEN: usize = 16;

/// Smallest framed value that can possibly decrypt.
pub const MIN_FRAMED_LEN: usize = NONCE_LEN + TAG_LEN;

/// Errors produced by the cipher layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The framed input is shorter than `nonce ‖ tag`.
    #[error("framed ciphertext truncated: expected at least {MIN_FRAMED_LEN} bytes, got {0}")]
    Truncated(usize),

    /// AES-GCM-SIV encryption or authentication failed.
    #[error("aead operation failed")]
    AeadFailure,
}

/// Encrypt `plaintext` under `key`, returning `nonce ‖ tag ‖ ciphertext`.
///
/// # Errors
///
/// Returns [`CipherError::AeadFailure`] on an internal AEAD error (unreachable
/// for inputs below the AES-GCM-SIV length limit).
pub fn seal_bytes(key: &KeyMaterial, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key);

    use aes_gcm_siv::aead::rand_core::RngCore;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);

    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce_bytes), b"", &mut buffer)
        .map_err(|_| CipherError::AeadFailure)?;

    let mut framed = Vec::with_capacity(MIN_FRAMED_LEN + buffer.len());
    framed.extend_from_slice(&nonce_bytes);
    framed.extend_from_slice(tag.as_slice());
    framed.extend_from_slice(&buffer);
    Ok(framed)
}

/// Decrypt a `nonce ‖ tag ‖ ciphertext` frame produced by [`seal_bytes`].
///
/// # Errors
///
/// Returns [`CipherError::Truncated`] if `framed` cannot hold a nonce and tag,
/// and [`CipherError::AeadFailure`] if authentication fails (wrong key or
/// tampered bytes).
pub fn open_bytes(key: &KeyMaterial, framed: &[u8]) -> Result<Vec<u8>, CipherError> {
    if framed.len() < MIN_FRAMED_LEN {
        return Err(CipherError::Truncated(framed.len()));
    }
    let (nonce_bytes, rest) = framed.split_at(NONCE_LEN);
    let (tag_bytes, ciphertext) = rest.split_at(TAG_LEN);

    let cipher = build_cipher(key);
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce_bytes),
            b"",
            &mut buffer,
            Tag::from_slice(tag_bytes),
        )
        .map_err(|_| CipherError::AeadFailure)?;
    Ok(buffer)
}

fn build_cipher(key: &KeyMaterial) -> Aes256GcmSiv {
    // KeyMaterial is always exactly KEY_LEN bytes.
    Aes256GcmSiv::new(aes_gcm_siv::Key::<Aes256GcmSiv>::from_slice(key.as_bytes()))
}
