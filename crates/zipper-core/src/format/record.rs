//! Central directory records.

use std::io::Write;

use crate::Result;
use crate::ZipperError;

use super::CENTRAL_HEADER_LEN;
use super::CENTRAL_HEADER_SIGNATURE;
use super::DosDateTime;
use super::FLAG_DATA_DESCRIPTOR;
use super::VERSION_ZIP64;
use super::ZIP64_EXTRA_ID;
use super::ZIP64_THRESHOLD;
use super::needs_zip64;

/// One central directory file header.
///
/// Sizes and the local header offset are always the full 64-bit values; the
/// ZIP64 extra field (`0x0001`) is stripped from `extra` on parse and
/// regenerated on write when any value reaches the 32-bit limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralRecord {
    /// Host system and format version of the producer.
    pub version_made_by: u16,
    /// Minimum format version needed to extract.
    pub version_needed: u16,
    /// General purpose bit flags.
    pub flags: u16,
    /// Compression method (0 = stored, 8 = DEFLATE).
    pub method: u16,
    /// Last modification time.
    pub modified: DosDateTime,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Size of the compressed data.
    pub compressed_size: u64,
    /// Size of the uncompressed data.
    pub uncompressed_size: u64,
    /// Disk on which the entry starts.
    pub disk_start: u16,
    /// Internal file attributes.
    pub internal_attrs: u16,
    /// External file attributes (Unix mode in the high 16 bits).
    pub external_attrs: u32,
    /// Offset of the local file header.
    pub local_header_offset: u64,
    /// Entry name as stored.
    pub raw_name: Vec<u8>,
    /// Entry name decoded for lookup.
    pub name: String,
    /// Extra fields other than ZIP64.
    pub extra: Vec<u8>,
    /// File comment bytes.
    pub comment: Vec<u8>,
}

impl CentralRecord {
    /// Returns `true` if sizes are stored in a trailing data descriptor.
    #[must_use]
    pub const fn has_data_descriptor(&self) -> bool {
        self.flags & FLAG_DATA_DESCRIPTOR != 0
    }

    /// Returns `true` if the record needs a ZIP64 extra field.
    #[must_use]
    pub fn is_zip64(&self) -> bool {
        needs_zip64(self.uncompressed_size)
            || needs_zip64(self.compressed_size)
            || needs_zip64(self.local_header_offset)
    }

    /// Returns the Unix permission bits, if the producer recorded them.
    #[must_use]
    pub const fn unix_mode(&self) -> Option<u32> {
        if self.version_made_by >> 8 == 3 && self.external_attrs >> 16 != 0 {
            Some(self.external_attrs >> 16)
        } else {
            None
        }
    }

    fn zip64_extra(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(24);
        if needs_zip64(self.uncompressed_size) {
            data.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        }
        if needs_zip64(self.compressed_size) {
            data.extend_from_slice(&self.compressed_size.to_le_bytes());
        }
        if needs_zip64(self.local_header_offset) {
            data.extend_from_slice(&self.local_header_offset.to_le_bytes());
        }
        if data.is_empty() {
            return data;
        }

        let mut field = Vec::with_capacity(4 + data.len());
        field.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        field.extend_from_slice(&(data.len() as u16).to_le_bytes());
        field.extend_from_slice(&data);
        field
    }

    /// Writes the record in central directory form.
    ///
    /// Returns the number of bytes written.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<u64> {
        let mut extra = self.zip64_extra();
        let version_needed = if extra.is_empty() {
            self.version_needed
        } else {
            self.version_needed.max(VERSION_ZIP64)
        };
        extra.extend_from_slice(&self.extra);

        let name_len = field_len(self.raw_name.len(), "entry name")?;
        let extra_len = field_len(extra.len(), "extra field")?;
        let comment_len = field_len(self.comment.len(), "entry comment")?;

        out.write_all(&CENTRAL_HEADER_SIGNATURE.to_le_bytes())?;
        out.write_all(&self.version_made_by.to_le_bytes())?;
        out.write_all(&version_needed.to_le_bytes())?;
        out.write_all(&self.flags.to_le_bytes())?;
        out.write_all(&self.method.to_le_bytes())?;
        out.write_all(&self.modified.time.to_le_bytes())?;
        out.write_all(&self.modified.date.to_le_bytes())?;
        out.write_all(&self.crc32.to_le_bytes())?;
        out.write_all(&clamp32(self.compressed_size).to_le_bytes())?;
        out.write_all(&clamp32(self.uncompressed_size).to_le_bytes())?;
        out.write_all(&name_len.to_le_bytes())?;
        out.write_all(&extra_len.to_le_bytes())?;
        out.write_all(&comment_len.to_le_bytes())?;
        out.write_all(&self.disk_start.to_le_bytes())?;
        out.write_all(&self.internal_attrs.to_le_bytes())?;
        out.write_all(&self.external_attrs.to_le_bytes())?;
        out.write_all(&clamp32(self.local_header_offset).to_le_bytes())?;
        out.write_all(&self.raw_name)?;
        out.write_all(&extra)?;
        out.write_all(&self.comment)?;

        Ok((CENTRAL_HEADER_LEN + self.raw_name.len() + extra.len() + self.comment.len()) as u64)
    }
}

/// Replaces values at or above the 32-bit limit with the ZIP64 marker.
pub(crate) fn clamp32(value: u64) -> u32 {
    if needs_zip64(value) {
        ZIP64_THRESHOLD as u32
    } else {
        value as u32
    }
}

fn field_len(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| {
        ZipperError::corrupt(format!("{what} is {len} bytes, exceeding the 65535-byte limit"))
    })
}

/// Parsed central directory plus end-of-central-directory data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CentralDirectory {
    /// Records in stored order.
    pub records: Vec<CentralRecord>,
    /// Archive comment bytes.
    pub comment: Vec<u8>,
    /// Offset of the first central record.
    pub cd_offset: u64,
    /// Total size of all central records.
    pub cd_size: u64,
}

impl CentralDirectory {
    /// Finds the first record with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&CentralRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Returns the index of the first record with the given name.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|r| r.name == name)
    }
}
