//! Authenticated encryption using ChaCha20-Poly1305 (RFC 8439)
//!
//! Associated data is always empty. `seal` output is the ciphertext followed
//! by the 16-byte Poly1305 tag.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use zeroize::Zeroizing;

use crate::error::{DirsealError, ErrorCategory, ErrorKind, Result};
use crate::kdf::KEY_LEN;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of the Poly1305 authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Message shared by every authentication failure. Wrong password, corruption
/// and tampering are deliberately reported identically.
pub(crate) const AUTH_FAILED_MSG: &str = "corrupt input, tampered-with data, or bad passphrase";

/// Encrypt and authenticate `plaintext`, returning ciphertext with the tag appended.
pub fn seal(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| {
            DirsealError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::InternalInvariant,
                format!("encryption failed: {}", e),
            )
        })
}

/// Verify and decrypt `sealed` (ciphertext with tag appended).
///
/// Never returns partial plaintext: any tag mismatch yields an
/// [`ErrorKind::AuthenticationFailed`] error.
pub fn open(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    sealed: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| {
            DirsealError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                AUTH_FAILED_MSG,
            )
        })?;
    Ok(Zeroizing::new(plaintext))
}
