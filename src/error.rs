use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee that the error is not, for
    /// example, caused by the user. It only means the code cannot tell.
    Internal,

    /// The user provided invalid input (a damaged record, the wrong key, a
    /// missing file) or asked for something impossible.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The record is shorter than the minimum record size.
    Truncated,
    /// The ciphertext region is empty or not a multiple of the block size.
    Misaligned,
    /// Padding removal failed or the recomputed digest did not match the
    /// stored one. Covers tampering, corruption and use of the wrong key.
    IntegrityFailed,
    /// A key was not exactly 32 bytes.
    KeyLength,
    /// A key could not be obtained from the configured source.
    KeyUnavailable,
    /// Unexpected state reached within filecipher logic.
    InternalInvariant,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct FileCipherError {
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

impl FileCipherError {
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

    /// The record was malformed: undersized or not block aligned.
    pub fn is_format(&self) -> bool {
        matches!(
            self.kind,
            Some(ErrorKind::Truncated) | Some(ErrorKind::Misaligned)
        )
    }

    /// The decrypted output must not be trusted.
    pub fn is_integrity(&self) -> bool {
        self.kind == Some(ErrorKind::IntegrityFailed)
    }

    /// The key had the wrong length.
    pub fn is_key(&self) -> bool {
        self.kind == Some(ErrorKind::KeyLength)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, FileCipherError>;
