//! The on-disk envelope: Argon2id + ChaCha20-Poly1305
//!
//! The binary format is entirely positional:
//! - salt: 16 bytes
//! - nonce: 12 bytes
//! - sealed box: variable length (ciphertext plus 16-byte Poly1305 tag)
//!
//! There is no magic, version or length field. Changing any of this requires
//! a new marker extension.

use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::cipher::{self, NONCE_LEN, TAG_LEN};
use crate::error::{DirsealError, ErrorCategory, ErrorKind, Result};
use crate::kdf::{self, SALT_LEN};

/// Extension (without the dot) that marks a file as an envelope.
pub const MARKER_EXTENSION: &str = "enc";

/// Length of the fixed-size fields preceding the sealed box.
pub const HEADER_LEN: usize = SALT_LEN + NONCE_LEN;

/// Total envelope length for a plaintext of `plaintext_len` bytes.
pub const fn envelope_len(plaintext_len: usize) -> usize {
    HEADER_LEN + plaintext_len + TAG_LEN
}

/// A parsed envelope borrowing from the raw file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub salt: &'a [u8; SALT_LEN],
    pub nonce: &'a [u8; NONCE_LEN],
    pub sealed: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Split raw envelope bytes into salt, nonce and sealed box.
    ///
    /// Only the fixed-length fields are checked here; a sealed box shorter
    /// than a tag is left for authentication to reject.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(DirsealError::with_kind(
                ErrorCategory::User,
                ErrorKind::MalformedEnvelope,
                format!(
                    "input likely truncated: {} bytes is shorter than the {}-byte salt and nonce",
                    bytes.len(),
                    HEADER_LEN
                ),
            ));
        }

        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (nonce, sealed) = rest.split_at(NONCE_LEN);
        let salt: &[u8; SALT_LEN] = salt.try_into().map_err(|_| invariant("salt split"))?;
        let nonce: &[u8; NONCE_LEN] = nonce.try_into().map_err(|_| invariant("nonce split"))?;

        Ok(Self {
            salt,
            nonce,
            sealed,
        })
    }

    /// Serialize as `salt || nonce || sealed`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(HEADER_LEN + self.sealed.len());
        output.extend_from_slice(self.salt);
        output.extend_from_slice(self.nonce);
        output.extend_from_slice(self.sealed);
        output
    }
}

fn invariant(what: &str) -> DirsealError {
    DirsealError::with_kind(
        ErrorCategory::Internal,
        ErrorKind::InternalInvariant,
        format!("envelope {} produced a field of the wrong length", what),
    )
}

fn fill_random(buf: &mut [u8], what: &str) -> Result<()> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        DirsealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::RandomSource,
            format!("failed to generate {}", what),
            e,
        )
    })
}

/// Draw a fresh salt from the operating system's secure random source.
pub fn random_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    fill_random(&mut salt, "salt")?;
    Ok(salt)
}

/// Draw a fresh nonce, independently of any salt drawn before it.
pub fn random_nonce() -> Result<[u8; NONCE_LEN]> {
    let mut nonce = [0u8; NONCE_LEN];
    fill_random(&mut nonce, "nonce")?;
    Ok(nonce)
}

/// Encrypt plaintext with a password using a random salt and nonce
///
/// Returns the envelope bytes: salt(16) + nonce(12) + sealedbox(variable)
pub fn encrypt(password: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let salt = random_salt()?;
    let nonce = random_nonce()?;

    encrypt_deterministic(password, plaintext, &salt, &nonce)
}

/// Encrypt plaintext with a password using provided salt and nonce
///
/// This function is ONLY for testing purposes to generate deterministic output.
/// NEVER use this in production - always use `encrypt()` which generates random salt/nonce.
pub fn encrypt_deterministic(
    password: &[u8],
    plaintext: &[u8],
    salt: &[u8; SALT_LEN],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>> {
    let key = kdf::derive_key(password, salt)?;
    let sealed = cipher::seal(&key, nonce, plaintext)?;

    Ok(Envelope {
        salt,
        nonce,
        sealed: &sealed,
    }
    .to_bytes())
}

/// Decrypt envelope bytes with a password
pub fn decrypt(password: &[u8], envelope: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let envelope = Envelope::parse(envelope)?;
    let key = kdf::derive_key(password, envelope.salt)?;
    cipher::open(&key, envelope.nonce, envelope.sealed)
}
