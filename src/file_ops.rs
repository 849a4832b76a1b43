//! In-place file encryption/decryption operations
//!
//! Each operation transforms exactly one file. The new file is fully written,
//! synced and verified before the source is removed, so an interrupted run
//! leaves every file either untouched, transformed, or briefly duplicated,
//! never half-written.

use crate::cipher;
use crate::envelope::{self, Envelope, MARKER_EXTENSION};
use crate::error::{DirsealError, ErrorCategory, ErrorKind, Result};
use crate::kdf;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

/// Prefix of the temporary files new outputs are staged in.
pub(crate) const TEMP_PREFIX: &str = ".dirseal-";

/// Whether the file name of `path` ends in `.enc`.
///
/// A file named exactly `.enc` counts: it is never encrypted, and decrypting
/// it fails because stripping the marker leaves no name.
pub fn is_envelope_path(path: &Path) -> bool {
    let marker = format!(".{}", MARKER_EXTENSION);
    path.file_name()
        .is_some_and(|name| name.as_encoded_bytes().ends_with(marker.as_bytes()))
}

/// Whether `path` is a staging file left behind by an interrupted run.
pub fn is_staging_path(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.as_encoded_bytes().starts_with(TEMP_PREFIX.as_bytes()))
}

/// `<path>.enc`
pub fn encrypted_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(MARKER_EXTENSION);
    PathBuf::from(name)
}

/// `path` with exactly one trailing `.enc` removed, or `None` if it has none.
pub fn decrypted_path(path: &Path) -> Option<PathBuf> {
    if path.extension().is_some_and(|ext| ext == MARKER_EXTENSION) {
        Some(path.with_extension(""))
    } else {
        None
    }
}

/// Encrypt a file in place
///
/// Writes `<path>.enc` containing `salt || nonce || ciphertext_with_tag` and,
/// once that file is durably in place and has the expected length, removes
/// `path`. Returns the path of the envelope.
///
/// On any failure before the removal, `path` is left untouched.
pub fn encrypt_file(path: &Path, password: &[u8]) -> Result<PathBuf> {
    if is_envelope_path(path) {
        return Err(DirsealError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotACandidate,
            format!(
                "refusing to encrypt {}: it already has the .{} extension",
                path.display(),
                MARKER_EXTENSION
            ),
        ));
    }
    let output_path = encrypted_path(path);

    let salt = envelope::random_salt()?;
    debug!(path = %path.display(), "deriving key");
    let key = kdf::derive_key(password, &salt)?;
    let nonce = envelope::random_nonce()?;

    let plaintext = Zeroizing::new(fs::read(path).map_err(|e| read_error(path, e))?);
    let sealed = cipher::seal(&key, &nonce, &plaintext)?;
    let contents = Envelope {
        salt: &salt,
        nonce: &nonce,
        sealed: &sealed,
    }
    .to_bytes();

    write_new_file(&output_path, &contents)
        .map_err(|e| e.with_context(format!("failed to write {}", output_path.display())))?;
    remove_source(path)?;

    Ok(output_path)
}

/// Decrypt an envelope file in place
///
/// Writes the plaintext to `path` with the `.enc` extension stripped and,
/// once that file is durably in place and has the expected length, removes
/// the envelope. Returns the path of the plaintext file.
///
/// On any failure before the removal, including authentication failure, the
/// envelope is left untouched and no plaintext file is created.
pub fn decrypt_file(path: &Path, password: &[u8]) -> Result<PathBuf> {
    let output_path = decrypted_path(path).ok_or_else(|| {
        DirsealError::with_kind(
            ErrorCategory::User,
            ErrorKind::NotACandidate,
            format!(
                "refusing to decrypt {}: its name does not end in .{} after a non-empty stem",
                path.display(),
                MARKER_EXTENSION
            ),
        )
    })?;

    let envelope_bytes = fs::read(path).map_err(|e| read_error(path, e))?;
    let envelope = Envelope::parse(&envelope_bytes)?;
    debug!(path = %path.display(), "deriving key");
    let key = kdf::derive_key(password, envelope.salt)?;
    let plaintext = cipher::open(&key, envelope.nonce, envelope.sealed)?;

    write_new_file(&output_path, &plaintext)
        .map_err(|e| e.with_context(format!("failed to write {}", output_path.display())))?;
    remove_source(path)?;

    Ok(output_path)
}

/// Stage `contents` in a temporary file next to `path`, sync it, and move it
/// into place without overwriting anything that already exists at `path`.
///
/// The temporary file is created with mode 0o600 on Unix systems, and the
/// final file keeps that mode.
fn write_new_file(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp_file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to create tempfile", e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a complete file.
    temp_file
        .flush()
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to flush tempfile", e))?;
    temp_file.as_file().sync_all().map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    temp_file.persist_noclobber(path).map_err(|e| {
        let category = if e.error.kind() == io::ErrorKind::AlreadyExists {
            ErrorCategory::User
        } else {
            ErrorCategory::Internal
        };
        io_error(
            category,
            format!("failed to move tempfile into place at {}", path.display()),
            e.error,
        )
    })?;
    debug!(path = %path.display(), "output persisted");

    verify_written(path, contents.len())
}

fn verify_written(path: &Path, expected_len: usize) -> Result<()> {
    let actual_len = fs::metadata(path)
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to stat written file", e))?
        .len();

    if actual_len != expected_len as u64 {
        return Err(DirsealError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!(
                "written file has {} bytes, expected {}",
                actual_len, expected_len
            ),
        ));
    }
    Ok(())
}

fn remove_source(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            format!("failed to remove source file {}", path.display()),
            e,
        )
    })?;
    debug!(path = %path.display(), "source removed");
    Ok(())
}

fn io_error(
    category: ErrorCategory,
    msg: impl Into<String>,
    err: impl std::error::Error + Send + Sync + 'static,
) -> DirsealError {
    DirsealError::with_kind_and_source(category, ErrorKind::Io, msg, err)
}

fn read_error(path: &Path, err: io::Error) -> DirsealError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    io_error(
        category,
        format!("failed to read from {}", path.display()),
        err,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::envelope_len;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");

        let plaintext = b"Hello, dirseal!";
        fs::write(&plain_path, plaintext).unwrap();

        let crypt_path = encrypt_file(&plain_path, b"test password").unwrap();
        assert_eq!(crypt_path, temp_dir.path().join("plain.txt.enc"));
        assert!(crypt_path.exists());
        assert!(!plain_path.exists());
        assert_eq!(
            fs::metadata(&crypt_path).unwrap().len(),
            envelope_len(plaintext.len()) as u64
        );

        let decrypted_path = decrypt_file(&crypt_path, b"test password").unwrap();
        assert_eq!(decrypted_path, plain_path);
        assert!(!crypt_path.exists());
        assert_eq!(fs::read(&plain_path).unwrap(), plaintext);
    }

    #[test]
    fn test_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("empty.txt");
        fs::write(&plain_path, b"").unwrap();

        let crypt_path = encrypt_file(&plain_path, b"correct-horse").unwrap();
        assert_eq!(crypt_path, temp_dir.path().join("empty.txt.enc"));
        assert_eq!(fs::metadata(&crypt_path).unwrap().len(), 44);
        assert!(!plain_path.exists());
    }

    #[test]
    fn test_decrypt_wrong_password_leaves_envelope() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("empty.txt");
        fs::write(&plain_path, b"").unwrap();

        let crypt_path = encrypt_file(&plain_path, b"correct-horse").unwrap();
        let before = fs::read(&crypt_path).unwrap();

        let err = decrypt_file(&crypt_path, b"wrong-password").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(fs::read(&crypt_path).unwrap(), before);
        assert!(!plain_path.exists());
    }

    #[test]
    fn test_decrypt_truncated_envelope() {
        let temp_dir = TempDir::new().unwrap();
        let crypt_path = temp_dir.path().join("short.bin.enc");
        fs::write(&crypt_path, [0u8; 27]).unwrap();

        let err = decrypt_file(&crypt_path, b"test").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::MalformedEnvelope));
        assert!(crypt_path.exists());
        assert!(!temp_dir.path().join("short.bin").exists());
    }

    #[test]
    fn test_encrypt_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.txt");

        let err = encrypt_file(&missing, b"test").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Io));
        assert_eq!(err.category, ErrorCategory::User);
        assert!(!temp_dir.path().join("missing.txt.enc").exists());
    }

    #[test]
    fn test_encrypt_does_not_clobber_existing_envelope() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("a.txt");
        let crypt_path = temp_dir.path().join("a.txt.enc");
        fs::write(&plain_path, b"new").unwrap();
        fs::write(&crypt_path, b"pre-existing").unwrap();

        let err = encrypt_file(&plain_path, b"test").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::Io));
        assert_eq!(fs::read(&plain_path).unwrap(), b"new");
        assert_eq!(fs::read(&crypt_path).unwrap(), b"pre-existing");

        // No staging files left behind.
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().starts_with(TEMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty(), "leftover tempfiles: {:?}", leftovers);
    }

    #[test]
    fn test_refuses_wrong_direction() {
        let temp_dir = TempDir::new().unwrap();
        let crypt_path = temp_dir.path().join("a.txt.enc");
        let plain_path = temp_dir.path().join("a.txt");
        fs::write(&crypt_path, b"x").unwrap();
        fs::write(&plain_path, b"y").unwrap();

        let err = encrypt_file(&crypt_path, b"test").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NotACandidate));
        let err = decrypt_file(&plain_path, b"test").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NotACandidate));
        assert!(crypt_path.exists());
        assert!(plain_path.exists());
        assert!(!temp_dir.path().join("a.txt.enc.enc").exists());
    }

    #[test]
    fn test_path_helpers() {
        assert!(is_envelope_path(Path::new("dir/a.txt.enc")));
        assert!(!is_envelope_path(Path::new("dir/a.txt")));
        assert!(!is_envelope_path(Path::new("dir/a.encrypted")));
        assert!(is_envelope_path(Path::new(".enc")));
        assert!(is_envelope_path(Path::new("dir/.enc")));
        assert!(is_envelope_path(Path::new("dir/a..enc")));

        assert!(is_staging_path(Path::new("dir/.dirseal-Xa81Qz")));
        assert!(!is_staging_path(Path::new("dir/notes.dirseal-txt")));

        assert_eq!(
            encrypted_path(Path::new("dir/a.txt")),
            PathBuf::from("dir/a.txt.enc")
        );
        assert_eq!(
            decrypted_path(Path::new("dir/a.txt.enc")),
            Some(PathBuf::from("dir/a.txt"))
        );
        assert_eq!(
            decrypted_path(Path::new("dir/a.enc.enc")),
            Some(PathBuf::from("dir/a.enc"))
        );
        assert_eq!(
            decrypted_path(Path::new("dir/a..enc")),
            Some(PathBuf::from("dir/a."))
        );
        assert_eq!(decrypted_path(Path::new("dir/a.txt")), None);
        assert_eq!(decrypted_path(Path::new("dir/.enc")), None);
    }

    #[test]
    fn test_bare_marker_name_is_never_transformed() {
        let temp_dir = TempDir::new().unwrap();
        let bare = temp_dir.path().join(".enc");
        fs::write(&bare, b"whatever").unwrap();

        let err = encrypt_file(&bare, b"test").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NotACandidate));
        let err = decrypt_file(&bare, b"test").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::NotACandidate));

        assert_eq!(fs::read(&bare).unwrap(), b"whatever");
        assert!(!temp_dir.path().join(".enc.enc").exists());
    }

    #[test]
    #[cfg(unix)]
    fn test_file_permissions() {
        let temp_dir = TempDir::new().unwrap();
        let plain_path = temp_dir.path().join("plain.txt");
        fs::write(&plain_path, b"test").unwrap();

        let crypt_path = encrypt_file(&plain_path, b"test").unwrap();

        let metadata = fs::metadata(&crypt_path).unwrap();
        let permissions = metadata.permissions();
        assert_eq!(permissions.mode() & 0o777, 0o600);
    }
}
