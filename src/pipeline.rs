//! Batch processing of a file set
//!
//! A run is either encrypt-all or decrypt-all, chosen once via [`Mode`].
//! Files are processed strictly one after another in the order given; a
//! failure is contained to the file it happened on and the run continues.

use crate::discovery::{self, Selector};
use crate::error::{ErrorKind, Result};
use crate::file_ops;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

impl Mode {
    fn verb(self) -> &'static str {
        match self {
            Mode::Encrypt => "encrypted",
            Mode::Decrypt => "decrypted",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Encrypt => f.write_str("encrypt"),
            Mode::Decrypt => f.write_str("decrypt"),
        }
    }
}

/// A file that could not be transformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub path: PathBuf,
    pub kind: Option<ErrorKind>,
    pub message: String,
}

/// Per-file outcomes of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Paths of the files written (envelopes when encrypting, plaintext when
    /// decrypting).
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<Failure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Transform a single file according to `mode`.
pub fn process_file(mode: Mode, path: &Path, password: &[u8]) -> Result<PathBuf> {
    match mode {
        Mode::Encrypt => file_ops::encrypt_file(path, password),
        Mode::Decrypt => file_ops::decrypt_file(path, password),
    }
}

/// Process an externally supplied, ordered file set.
///
/// Paths the selector rejects (envelopes when encrypting, non-envelopes when
/// decrypting, the executable itself) are skipped without being touched.
pub fn run_files<I>(selector: &Selector, files: I, password: &[u8]) -> BatchReport
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    let mode = selector.mode();
    let mut report = BatchReport::default();

    for path in files {
        let path = path.as_ref();
        if !selector.accepts(path) {
            debug!(path = %path.display(), %mode, "not a candidate; skipping");
            continue;
        }

        match process_file(mode, path, password) {
            Ok(output) => {
                info!("{} {}", mode.verb(), path.display());
                report.succeeded.push(output);
            }
            Err(e) => {
                let kind = e
                    .kind
                    .map(ErrorKind::label)
                    .unwrap_or("error");
                error!(
                    "{} failed for {} ({}): {}",
                    mode,
                    path.display(),
                    kind,
                    e.chain_message()
                );
                report.failed.push(Failure {
                    path: path.to_path_buf(),
                    kind: e.kind,
                    message: e.chain_message(),
                });
            }
        }
    }

    report
}

/// Discover every candidate under `root` and process them in order.
pub fn run(root: &Path, selector: &Selector, password: &[u8]) -> BatchReport {
    let files = discovery::discover(root, selector);
    run_files(selector, files, password)
}
