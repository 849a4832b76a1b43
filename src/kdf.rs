//! Password-based key derivation using Argon2id
//!
//! The cost parameters are fixed and not stored alongside the ciphertext, so
//! they must never change for an existing marker extension: the salt and the
//! password alone determine the key on both the encrypt and decrypt paths.

use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::Zeroizing;

use crate::error::{DirsealError, ErrorCategory, ErrorKind, Result};

/// Length of salt in bytes
pub const SALT_LEN: usize = 16;

/// Length of derived key in bytes
pub const KEY_LEN: usize = 32;

/// Argon2 time cost (passes over memory)
const ARGON2_T_COST: u32 = 1;

/// Argon2 memory cost in KiB (64 MiB)
const ARGON2_M_COST_KIB: u32 = 64 * 1024;

/// Argon2 parallelism (lanes)
const ARGON2_P_COST: u32 = 4;

/// Derive a 32-byte key from a password and salt using Argon2id.
///
/// Deterministic: the same password and salt always yield the same key.
pub fn derive_key(password: &[u8], salt: &[u8; SALT_LEN]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let params = Params::new(
        ARGON2_M_COST_KIB,
        ARGON2_T_COST,
        ARGON2_P_COST,
        Some(KEY_LEN),
    )
    .map_err(|e| {
        DirsealError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::KeyDerivation,
            format!("invalid argon2 parameters: {}", e),
        )
    })?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(password, salt, &mut key[..])
        .map_err(|e| {
            DirsealError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::KeyDerivation,
                format!("argon2id key derivation failed: {}", e),
            )
        })?;

    Ok(key)
}
