use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example, due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input (a wrong password, a damaged file, a
    /// missing path) or asked for something impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The secure random source could not produce salt or nonce bytes.
    RandomSource,
    /// Argon2id could not run to completion (bad parameters or resource
    /// exhaustion).
    KeyDerivation,
    /// Authentication failed due to an incorrect password or tampering
    /// or corruption.
    AuthenticationFailed,
    /// The stored file is too short to hold the fixed-length salt and nonce.
    MalformedEnvelope,
    /// The path is not one this operation transforms: encrypting an
    /// envelope, or decrypting a file without the marker extension.
    NotACandidate,
    /// Password could not be obtained from the configured reader.
    PassphraseUnavailable,
    /// The password and its re-entry differ.
    PassphraseMismatch,
    /// Unexpected state reached within dirseal logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin, or other I/O failed.
    Io,
}

impl ErrorKind {
    /// Short stable label used in per-file diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::RandomSource => "random source failure",
            ErrorKind::KeyDerivation => "key derivation failure",
            ErrorKind::AuthenticationFailed => "authentication failure",
            ErrorKind::MalformedEnvelope => "malformed envelope",
            ErrorKind::NotACandidate => "not a candidate",
            ErrorKind::PassphraseUnavailable => "password unavailable",
            ErrorKind::PassphraseMismatch => "password mismatch",
            ErrorKind::InternalInvariant => "internal error",
            ErrorKind::Io => "i/o failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct DirsealError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl DirsealError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Renders the message followed by every source in the chain, separated
    /// by `": "`.
    pub fn chain_message(&self) -> String {
        let mut out = self.msg.clone();
        let mut next = self.source_error().map(|e| e as &(dyn StdError + 'static));
        while let Some(err) = next {
            out.push_str(": ");
            out.push_str(&err.to_string());
            next = err.source();
        }
        out
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DirsealError>;
