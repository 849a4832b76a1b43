//! Candidate file discovery
//!
//! Walks a directory tree and yields the regular files a run should
//! transform, in a deterministic order.

use crate::file_ops::{decrypted_path, is_envelope_path, is_staging_path};
use crate::pipeline::Mode;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Decides which paths a run may touch.
#[derive(Debug, Clone)]
pub struct Selector {
    mode: Mode,
    self_path: Option<PathBuf>,
}

impl Selector {
    /// `self_path` is the running executable; it is never selected.
    pub fn new(mode: Mode, self_path: Option<&Path>) -> Self {
        Self {
            mode,
            self_path: self_path.map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf())),
        }
    }

    /// Selector for the current process, excluding its own executable.
    pub fn for_current_exe(mode: Mode) -> Self {
        let exe = std::env::current_exe().ok();
        Self::new(mode, exe.as_deref())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Encryption accepts everything but envelopes; decryption accepts only
    /// envelopes with a name to restore. The executable and staging files of
    /// an interrupted run are rejected in both modes.
    pub fn accepts(&self, path: &Path) -> bool {
        let wanted = match self.mode {
            Mode::Encrypt => !is_envelope_path(path),
            Mode::Decrypt => decrypted_path(path).is_some(),
        };
        wanted && !is_staging_path(path) && !self.is_self(path)
    }

    fn is_self(&self, path: &Path) -> bool {
        let Some(self_path) = &self.self_path else {
            return false;
        };
        // Only canonicalize when the names agree.
        if path.file_name() != self_path.file_name() {
            return false;
        }
        fs::canonicalize(path).is_ok_and(|p| p == *self_path)
    }
}

/// List every regular file under `root` that `selector` accepts.
///
/// Directories are descended into, symlinks are neither followed nor
/// selected. Entries that cannot be read are logged and skipped. The whole
/// tree is listed before returning, so files created while the result is
/// being processed are never picked up.
pub fn discover(root: &Path, selector: &Selector) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                warn!(path = %path, "skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        if selector.accepts(entry.path()) {
            files.push(entry.into_path());
        }
    }

    debug!(
        root = %root.display(),
        mode = %selector.mode(),
        count = files.len(),
        "discovered candidate files"
    );
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("b.txt"), b"b").unwrap();
        fs::write(root.join("a.txt"), b"a").unwrap();
        fs::write(root.join("a.txt.enc"), b"x").unwrap();
        fs::write(root.join("sub/c.bin"), b"c").unwrap();
        fs::write(root.join("sub/deeper/d.enc"), b"x").unwrap();
        temp_dir
    }

    fn relative(root: &Path, files: Vec<PathBuf>) -> Vec<String> {
        files
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_encrypt_selects_plain_files_in_order() {
        let temp_dir = tree();
        let root = temp_dir.path();

        let files = discover(root, &Selector::new(Mode::Encrypt, None));
        assert_eq!(relative(root, files), vec!["a.txt", "b.txt", "sub/c.bin"]);
    }

    #[test]
    fn test_decrypt_selects_envelopes() {
        let temp_dir = tree();
        let root = temp_dir.path();

        let files = discover(root, &Selector::new(Mode::Decrypt, None));
        assert_eq!(relative(root, files), vec!["a.txt.enc", "sub/deeper/d.enc"]);
    }

    #[test]
    fn test_self_is_excluded() {
        let temp_dir = tree();
        let root = temp_dir.path();
        let fake_exe = root.join("sub/c.bin");

        let selector = Selector::new(Mode::Encrypt, Some(&fake_exe));
        assert!(!selector.accepts(&fake_exe));

        let files = discover(root, &selector);
        assert_eq!(relative(root, files), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_same_name_elsewhere_is_not_self() {
        let temp_dir = tree();
        let root = temp_dir.path();
        fs::write(root.join("c.bin"), b"other").unwrap();

        let selector = Selector::new(Mode::Encrypt, Some(&root.join("sub/c.bin")));
        assert!(selector.accepts(&root.join("c.bin")));
    }

    #[test]
    #[cfg(unix)]
    fn test_symlinks_are_not_selected() {
        let temp_dir = tree();
        let root = temp_dir.path();
        std::os::unix::fs::symlink(root.join("a.txt"), root.join("link.txt")).unwrap();

        let files = discover(root, &Selector::new(Mode::Encrypt, None));
        assert_eq!(relative(root, files), vec!["a.txt", "b.txt", "sub/c.bin"]);
    }

    #[test]
    fn test_staging_files_are_not_selected() {
        let temp_dir = tree();
        let root = temp_dir.path();
        fs::write(root.join(".dirseal-k3Jd9a"), b"left by a killed run").unwrap();
        fs::write(root.join("sub/.dirseal-Qp02xZ.enc"), b"x").unwrap();

        let files = discover(root, &Selector::new(Mode::Encrypt, None));
        assert_eq!(relative(root, files), vec!["a.txt", "b.txt", "sub/c.bin"]);

        let files = discover(root, &Selector::new(Mode::Decrypt, None));
        assert_eq!(relative(root, files), vec!["a.txt.enc", "sub/deeper/d.enc"]);
    }

    #[test]
    fn test_bare_marker_name_is_never_selected() {
        let temp_dir = tree();
        let root = temp_dir.path();
        fs::write(root.join("sub/.enc"), b"x").unwrap();

        let files = discover(root, &Selector::new(Mode::Encrypt, None));
        assert_eq!(relative(root, files), vec!["a.txt", "b.txt", "sub/c.bin"]);

        let files = discover(root, &Selector::new(Mode::Decrypt, None));
        assert_eq!(relative(root, files), vec!["a.txt.enc", "sub/deeper/d.enc"]);
    }

    #[test]
    fn test_missing_root_yields_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let files = discover(
            &temp_dir.path().join("nope"),
            &Selector::new(Mode::Encrypt, None),
        );
        assert!(files.is_empty());
    }
}
