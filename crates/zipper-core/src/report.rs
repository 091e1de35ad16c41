//! Rewrite reporting.

use std::time::Duration;

use crate::metadata::MetadataTarget;

/// Report of a metadata rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// Comment field that was rewritten.
    pub target: MetadataTarget,

    /// Number of entries copied into the new archive.
    pub entries_copied: usize,

    /// Bytes of entry data (headers, data, descriptors) copied.
    pub bytes_copied: u64,

    /// Size of the new archive in bytes.
    pub archive_size: u64,

    /// Whether the stored comment bytes differ from before.
    pub changed: bool,

    /// Duration of the rewrite.
    pub duration: Duration,
}

impl RewriteReport {
    /// Creates an empty report for `target`.
    #[must_use]
    pub const fn new(target: MetadataTarget) -> Self {
        Self {
            target,
            entries_copied: 0,
            bytes_copied: 0,
            archive_size: 0,
            changed: false,
            duration: Duration::ZERO,
        }
    }

    /// Bytes of the new archive spent on headers and comments rather than
    /// entry data.
    #[must_use]
    pub const fn directory_bytes(&self) -> u64 {
        self.archive_size.saturating_sub(self.bytes_copied)
    }
}
