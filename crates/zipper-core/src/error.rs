//! Error types for metadata-bearing archive operations.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionState;

/// Result type alias using `ZipperError`.
pub type Result<T> = std::result::Result<T, ZipperError>;

/// A failure of the metadata codec.
///
/// The variants fall into three families that callers usually want to tell
/// apart: encoding failures ([`TooLarge`](Self::TooLarge),
/// [`NotSerializable`](Self::NotSerializable)), decoding failures
/// ([`InvalidUtf8`](Self::InvalidUtf8)) and malformed payloads
/// ([`Malformed`](Self::Malformed)).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    /// Encoded metadata does not fit into a 16-bit comment field.
    #[error("encoded metadata is {size} bytes, exceeding the {max}-byte comment limit")]
    TooLarge {
        /// Size of the encoded JSON in bytes.
        size: usize,
        /// Maximum size of a ZIP comment field.
        max: usize,
    },

    /// The value cannot be represented as JSON.
    #[error("metadata is not JSON-serializable: {0}")]
    NotSerializable(String),

    /// The comment bytes are not valid UTF-8.
    #[error("metadata comment is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 {
        /// Length of the longest valid UTF-8 prefix.
        valid_up_to: usize,
    },

    /// The comment is UTF-8 text but not valid JSON.
    #[error("malformed metadata JSON at line {line}, column {column}: {reason}")]
    Malformed {
        /// Line of the syntax error (1-based).
        line: usize,
        /// Column of the syntax error (1-based).
        column: usize,
        /// Parser message.
        reason: String,
    },
}

impl MetadataError {
    /// Returns `true` for failures raised while encoding a value.
    #[must_use]
    pub const fn is_encoding_error(&self) -> bool {
        matches!(self, Self::TooLarge { .. } | Self::NotSerializable(_))
    }

    /// Returns `true` when the comment bytes were not UTF-8.
    #[must_use]
    pub const fn is_decoding_error(&self) -> bool {
        matches!(self, Self::InvalidUtf8 { .. })
    }

    /// Returns `true` when the comment was text but not JSON.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

/// Errors that can occur while creating, reading or rewriting archives.
#[derive(Error, Debug)]
pub enum ZipperError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation is not valid in the session's current state.
    #[error("cannot {operation}: archive is {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// State the session was in.
        state: SessionState,
    },

    /// Source file to add does not exist.
    #[error("source file not found: {path}")]
    SourceNotFound {
        /// The missing source path.
        path: PathBuf,
    },

    /// Source path exists but cannot be added as an entry.
    #[error("cannot add {path}: {reason}")]
    InvalidSource {
        /// The rejected source path.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// Archive file does not exist.
    #[error("archive not found: {path}")]
    NotFound {
        /// The missing archive path.
        path: PathBuf,
    },

    /// Archive path exists and the overwrite policy rejects it.
    #[error("archive already exists: {path}")]
    AlreadyExists {
        /// The existing archive path.
        path: PathBuf,
    },

    /// Named entry is not present in the archive.
    #[error("entry not found in archive: {name}")]
    EntryNotFound {
        /// The requested entry name.
        name: String,
    },

    /// An entry with the same name was already added.
    #[error("duplicate entry name: {name}")]
    DuplicateEntry {
        /// The conflicting entry name.
        name: String,
    },

    /// Entry name cannot be stored.
    #[error("invalid entry name '{name}': {reason}")]
    InvalidEntryName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Metadata could not be encoded or decoded.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Central directory or entry structure cannot be parsed.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// Entry uses a compression method this crate cannot decode.
    #[error("unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    /// Configured DEFLATE level is out of range.
    #[error("invalid compression level {level}, must be 0-9")]
    InvalidCompressionLevel {
        /// The rejected level.
        level: u8,
    },

    /// Operation was cancelled through a cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Replacing the original archive with the rewritten one failed.
    #[error("failed to replace {path}: {source}")]
    Replace {
        /// The archive that was being replaced.
        path: PathBuf,
        /// Underlying rename error.
        #[source]
        source: std::io::Error,
    },
}

impl ZipperError {
    /// Returns `true` if this error names something that does not exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use zipper_core::ZipperError;
    ///
    /// let err = ZipperError::EntryNotFound { name: "missing.txt".into() };
    /// assert!(err.is_not_found());
    ///
    /// let err = ZipperError::Cancelled;
    /// assert!(!err.is_not_found());
    /// ```
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::SourceNotFound { .. } | Self::EntryNotFound { .. }
        )
    }

    /// Returns the codec error, if this is one.
    #[must_use]
    pub const fn metadata_error(&self) -> Option<&MetadataError> {
        match self {
            Self::Metadata(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` for metadata encoding failures.
    #[must_use]
    pub fn is_encoding_error(&self) -> bool {
        self.metadata_error()
            .is_some_and(MetadataError::is_encoding_error)
    }

    /// Returns `true` for comments that are not valid UTF-8.
    #[must_use]
    pub fn is_decoding_error(&self) -> bool {
        self.metadata_error()
            .is_some_and(MetadataError::is_decoding_error)
    }

    /// Returns `true` for comments that are UTF-8 but not JSON.
    #[must_use]
    pub fn is_malformed_metadata(&self) -> bool {
        self.metadata_error().is_some_and(MetadataError::is_malformed)
    }

    /// Returns `true` if the archive structure could not be parsed.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptArchive(_))
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptArchive(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ZipperError::EntryNotFound {
            name: "missing.txt".into(),
        };
        assert_eq!(err.to_string(), "entry not found in archive: missing.txt");
    }

    #[test]
    fn test_too_large_names_limit() {
        let err = MetadataError::TooLarge {
            size: 70_000,
            max: 65_535,
        };
        let display = err.to_string();
        assert!(display.contains("70000"));
        assert!(display.contains("65535"));
        assert!(err.is_encoding_error());
    }

    #[test]
    fn test_invalid_state_display() {
        let err = ZipperError::InvalidState {
            operation: "add file",
            state: SessionState::Closed,
        };
        assert_eq!(err.to_string(), "cannot add file: archive is not opened");
    }

    #[test]
    fn test_metadata_error_classification() {
        let err: ZipperError = MetadataError::InvalidUtf8 { valid_up_to: 3 }.into();
        assert!(err.is_decoding_error());
        assert!(!err.is_encoding_error());
        assert!(!err.is_malformed_metadata());

        let err: ZipperError = MetadataError::Malformed {
            line: 1,
            column: 2,
            reason: "expected value".into(),
        }
        .into();
        assert!(err.is_malformed_metadata());
        assert!(!err.is_decoding_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ZipperError = io_err.into();
        assert!(matches!(err, ZipperError::Io(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_replace_error_source_chain() {
        use std::error::Error;

        let err = ZipperError::Replace {
            path: PathBuf::from("a.zip"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("a.zip"));
    }
}
