//! Password reading functionality

use crate::error::{DirsealError, ErrorCategory, ErrorKind, Result};
use std::io::{self, IsTerminal, Read, Write};
use zeroize::Zeroizing;

/// Prompt used for the first (or only) password entry.
pub const ENTER_PROMPT: &str = "Enter password: ";

/// Prompt used when re-entering the password for confirmation.
pub const CONFIRM_PROMPT: &str = "Confirm password: ";

/// Trait for reading passwords from various sources
pub trait PassphraseReader {
    /// Read a password as arbitrary bytes (not necessarily UTF-8)
    ///
    /// Returns the password wrapped in `Zeroizing` to ensure it is securely
    /// wiped from memory when dropped.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>>;
}

/// Returns a fixed password (for testing)
pub struct ConstantPassphraseReader {
    passphrase: Zeroizing<Vec<u8>>,
}

impl ConstantPassphraseReader {
    pub fn new(passphrase: Vec<u8>) -> Self {
        Self {
            passphrase: Zeroizing::new(passphrase),
        }
    }
}

impl PassphraseReader for ConstantPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        Ok(Zeroizing::new((*self.passphrase).clone()))
    }
}

/// Reads password from any io::Read source, byte for byte
pub struct ReaderPassphraseReader {
    reader: Box<dyn Read>,
}

impl ReaderPassphraseReader {
    pub fn new(reader: Box<dyn Read>) -> Self {
        Self { reader }
    }
}

impl PassphraseReader for ReaderPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let mut data = Zeroizing::new(Vec::new());
        self.reader.read_to_end(&mut data).map_err(|e| {
            DirsealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("error reading password: {}", e),
                e,
            )
        })?;
        Ok(data)
    }
}

/// Reads password from terminal with no echo
pub struct TerminalPassphraseReader {
    prompt: &'static str,
}

impl TerminalPassphraseReader {
    pub fn new(prompt: &'static str) -> Self {
        Self { prompt }
    }
}

impl Default for TerminalPassphraseReader {
    fn default() -> Self {
        Self::new(ENTER_PROMPT)
    }
}

impl PassphraseReader for TerminalPassphraseReader {
    /// Read password from terminal.
    ///
    /// Note: Terminal input is limited to UTF-8 due to rpassword library constraints.
    /// For non-UTF-8 passwords, use --passphrase-stdin instead.
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        if !io::stdin().is_terminal() {
            return Err(DirsealError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "cannot read password from terminal - stdin is not a terminal",
            ));
        }

        io::stderr()
            .write_all(self.prompt.as_bytes())
            .and_then(|()| io::stderr().flush())
            .map_err(|e| {
                DirsealError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    format!("failed to write prompt: {}", e),
                    e,
                )
            })?;

        // Read password *without echo*
        // Note: rpassword returns String (UTF-8 only), not zeroized
        let passphrase = rpassword::read_password().map_err(|e| {
            DirsealError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::PassphraseUnavailable,
                format!("failure reading password: {}", e),
                e,
            )
        })?;

        Ok(Zeroizing::new(passphrase.into_bytes()))
    }
}

/// Reads a password twice and only yields it if both entries agree
///
/// Used before encrypting, where a typo would make every file in the tree
/// unrecoverable.
pub struct ConfirmingPassphraseReader {
    entry: Box<dyn PassphraseReader>,
    confirmation: Box<dyn PassphraseReader>,
}

impl ConfirmingPassphraseReader {
    pub fn new(entry: Box<dyn PassphraseReader>, confirmation: Box<dyn PassphraseReader>) -> Self {
        Self {
            entry,
            confirmation,
        }
    }

    /// Confirmation against the terminal using the standard prompts.
    pub fn terminal() -> Self {
        Self::new(
            Box::new(TerminalPassphraseReader::new(ENTER_PROMPT)),
            Box::new(TerminalPassphraseReader::new(CONFIRM_PROMPT)),
        )
    }
}

impl PassphraseReader for ConfirmingPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let passphrase = self.entry.read_passphrase()?;
        let confirmation = self.confirmation.read_passphrase()?;
        confirm(passphrase, &confirmation)
    }
}

/// Reads a password and its re-entry from a single stream
///
/// The upstream bytes are split at the first `\n`: everything before it is
/// the password, everything after it (minus one trailing `\n`) the
/// confirmation. Both halves are otherwise kept byte for byte.
pub struct LinePairPassphraseReader {
    upstream: Box<dyn PassphraseReader>,
}

impl LinePairPassphraseReader {
    pub fn new(upstream: Box<dyn PassphraseReader>) -> Self {
        Self { upstream }
    }

    /// Password and confirmation read from stdin.
    pub fn stdin() -> Self {
        Self::new(Box::new(ReaderPassphraseReader::new(Box::new(io::stdin()))))
    }
}

impl PassphraseReader for LinePairPassphraseReader {
    fn read_passphrase(&mut self) -> Result<Zeroizing<Vec<u8>>> {
        let data = self.upstream.read_passphrase()?;

        let Some(split) = data.iter().position(|&b| b == b'\n') else {
            return Err(DirsealError::with_kind(
                ErrorCategory::User,
                ErrorKind::PassphraseUnavailable,
                "expected the password and its confirmation on separate lines",
            ));
        };

        let passphrase = Zeroizing::new(data[..split].to_vec());
        let rest = &data[split + 1..];
        let confirmation = rest.strip_suffix(b"\n").unwrap_or(rest);
        confirm(passphrase, confirmation)
    }
}

fn confirm(passphrase: Zeroizing<Vec<u8>>, confirmation: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if passphrase.as_slice() != confirmation {
        return Err(DirsealError::with_kind(
            ErrorCategory::User,
            ErrorKind::PassphraseMismatch,
            "passwords do not match",
        ));
    }
    Ok(passphrase)
}
