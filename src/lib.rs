//! dirseal - password-based in-place encryption of directory trees
//!
//! Every file is sealed into its own envelope (`<name>.enc`) holding a fresh
//! salt, a fresh nonce and the ChaCha20-Poly1305 ciphertext under an Argon2id
//! key derived from the password and that salt.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod discovery;
pub mod envelope;
pub mod error;
pub mod file_ops;
pub mod kdf;
pub mod passphrase;
pub mod pipeline;
