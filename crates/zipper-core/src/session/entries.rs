//! Entry listings with lazily decoded metadata.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::MetadataError;
use crate::format::CentralRecord;
use crate::metadata::codec;

/// One entry as reported by [`ArchiveSession::list_contents`].
///
/// The comment is decoded on the first call to [`metadata`](Self::metadata)
/// and the outcome is kept, so a malformed comment only affects the entry
/// that carries it.
///
/// [`ArchiveSession::list_contents`]: crate::ArchiveSession::list_contents
#[derive(Debug, Clone)]
pub struct EntryInfo {
    record: CentralRecord,
    metadata: OnceLock<Result<Option<Value>, MetadataError>>,
}

impl EntryInfo {
    pub(crate) fn new(record: CentralRecord) -> Self {
        Self {
            record,
            metadata: OnceLock::new(),
        }
    }

    /// Entry name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.record.name
    }

    /// Uncompressed size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.record.uncompressed_size
    }

    /// Compressed size in bytes.
    #[must_use]
    pub const fn compressed_size(&self) -> u64 {
        self.record.compressed_size
    }

    /// CRC-32 of the uncompressed data.
    #[must_use]
    pub const fn crc32(&self) -> u32 {
        self.record.crc32
    }

    /// Compression method id (0 = stored, 8 = DEFLATE).
    #[must_use]
    pub const fn compression_method(&self) -> u16 {
        self.record.method
    }

    /// Modification time, if the stored DOS timestamp is valid.
    #[must_use]
    pub fn modified(&self) -> Option<NaiveDateTime> {
        self.record.modified.to_naive()
    }

    /// Unix mode bits, if recorded.
    #[must_use]
    pub const fn unix_mode(&self) -> Option<u32> {
        self.record.unix_mode()
    }

    /// Returns `true` for directory entries.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.record.name.ends_with('/')
    }

    /// Comment bytes exactly as stored.
    #[must_use]
    pub fn raw_comment(&self) -> &[u8] {
        &self.record.comment
    }

    /// Returns `true` if the entry carries a non-empty comment.
    #[must_use]
    pub fn has_metadata(&self) -> bool {
        !self.record.comment.is_empty()
    }

    /// Decoded metadata; `Ok(None)` when the comment is empty.
    ///
    /// # Errors
    ///
    /// Returns the codec error if the comment is not UTF-8 JSON. Repeated
    /// calls return the same error without decoding again.
    pub fn metadata(&self) -> Result<Option<&Value>, MetadataError> {
        match self
            .metadata
            .get_or_init(|| codec::decode(&self.record.comment))
        {
            Ok(value) => Ok(value.as_ref()),
            Err(err) => Err(err.clone()),
        }
    }

    /// Central directory record of the entry.
    #[must_use]
    pub const fn record(&self) -> &CentralRecord {
        &self.record
    }
}
