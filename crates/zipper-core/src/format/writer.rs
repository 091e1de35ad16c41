//! Streaming archive writer.

use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;

use crate::CancellationToken;
use crate::MetadataError;
use crate::Result;
use crate::ZipperError;
use crate::copy::CopyBuffer;
use crate::copy::copy_exact;
use crate::copy::copy_with_buffer;
use crate::io::CountingWriter;
use crate::io::CrcReader;
use crate::metadata::MAX_COMMENT_LEN;

use super::CentralRecord;
use super::DATA_DESCRIPTOR_SIGNATURE;
use super::DosDateTime;
use super::EOCD_SIGNATURE;
use super::FLAG_DATA_DESCRIPTOR;
use super::FLAG_UTF8;
use super::LOCAL_HEADER_SIGNATURE;
use super::METHOD_DEFLATE;
use super::METHOD_STORED;
use super::VERSION_DEFAULT;
use super::VERSION_ZIP64;
use super::ZIP64_EOCD_LEN;
use super::ZIP64_EOCD_SIGNATURE;
use super::ZIP64_EXTRA_ID;
use super::ZIP64_LOCATOR_SIGNATURE;
use super::needs_zip64;
use super::read_local_header;
use super::record::clamp32;

/// Local ZIP64 extra field: header plus both 8-byte sizes.
const ZIP64_LOCAL_EXTRA_LEN: u16 = 4 + 16;

/// Host byte of the "made by" field for Unix.
const HOST_UNIX: u16 = 3 << 8;

/// Header fields of an entry about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    name: String,
    modified: DosDateTime,
    unix_mode: Option<u32>,
    comment: Vec<u8>,
    size_hint: Option<u64>,
}

impl NewEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modified: DosDateTime::now(),
            unix_mode: None,
            comment: Vec::new(),
            size_hint: None,
        }
    }

    /// Sets the modification time.
    #[must_use]
    pub fn with_modified(mut self, modified: DosDateTime) -> Self {
        self.modified = modified;
        self
    }

    /// Records Unix mode bits (including the file type) in the external
    /// attributes.
    #[must_use]
    pub fn with_unix_mode(mut self, mode: u32) -> Self {
        self.unix_mode = Some(mode);
        self
    }

    /// Sets the file comment.
    #[must_use]
    pub fn with_comment(mut self, comment: Vec<u8>) -> Self {
        self.comment = comment;
        self
    }

    /// Declares the expected uncompressed size.
    ///
    /// Entries without a hint, or whose hint is close to 4 GiB, get a ZIP64
    /// local header and 8-byte sizes in their data descriptor.
    #[must_use]
    pub fn with_size_hint(mut self, size: u64) -> Self {
        self.size_hint = Some(size);
        self
    }

    /// Returns the entry name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Writes a ZIP archive front to back without seeking.
///
/// Every local header sets the data-descriptor flag, so CRC and sizes are
/// written after the data and the output only needs [`Write`]. Central
/// records accumulate in memory until [`finish`](Self::finish).
///
/// # Examples
///
/// ```
/// use zipper_core::format::{ArchiveWriter, NewEntry, read_central_directory};
///
/// let mut writer = ArchiveWriter::new(Vec::new(), Some(6));
/// writer.add_entry(NewEntry::new("hello.txt"), &mut &b"hello"[..], None)?;
/// writer.set_comment(br#"{"project":"demo"}"#.to_vec())?;
/// let bytes = writer.finish()?;
///
/// let dir = read_central_directory(&mut std::io::Cursor::new(bytes))?;
/// assert_eq!(dir.records[0].name, "hello.txt");
/// # Ok::<(), zipper_core::ZipperError>(())
/// ```
#[derive(Debug)]
pub struct ArchiveWriter<W: Write> {
    out: CountingWriter<W>,
    records: Vec<CentralRecord>,
    comment: Vec<u8>,
    compression_level: Option<u8>,
    buffer: CopyBuffer,
}

impl<W: Write> ArchiveWriter<W> {
    /// Creates a writer; a level of `Some(0)` stores entries uncompressed.
    pub fn new(inner: W, compression_level: Option<u8>) -> Self {
        Self {
            out: CountingWriter::new(inner),
            records: Vec::new(),
            comment: Vec::new(),
            compression_level,
            buffer: CopyBuffer::new(),
        }
    }

    /// Central records of the entries written so far.
    #[must_use]
    pub fn records(&self) -> &[CentralRecord] {
        &self.records
    }

    /// Pending archive comment.
    #[must_use]
    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// Bytes written so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.out.position()
    }

    /// Sets the archive comment written by [`finish`](Self::finish).
    pub fn set_comment(&mut self, comment: Vec<u8>) -> Result<()> {
        check_comment_len(&comment)?;
        self.comment = comment;
        Ok(())
    }

    /// Streams `reader` into a new entry.
    ///
    /// If this fails part-way, the partial entry is left unreferenced: it
    /// gets no central record and the archive stays valid once finished.
    ///
    /// # Errors
    ///
    /// Returns [`ZipperError::InvalidEntryName`] for empty or oversized
    /// names, [`MetadataError::TooLarge`] for an oversized comment,
    /// [`ZipperError::Cancelled`] if `cancel` fires, and I/O errors.
    pub fn add_entry<R: Read>(
        &mut self,
        entry: NewEntry,
        reader: &mut R,
        cancel: Option<&CancellationToken>,
    ) -> Result<&CentralRecord> {
        let name_len = validate_name(&entry.name)?;
        check_comment_len(&entry.comment)?;

        let method = if self.compression_level == Some(0) {
            METHOD_STORED
        } else {
            METHOD_DEFLATE
        };
        let flags = FLAG_DATA_DESCRIPTOR | FLAG_UTF8;
        let offset = self.out.position();
        let zip64 = entry.size_hint.is_none_or(may_need_zip64);
        let version_needed = if zip64 { VERSION_ZIP64 } else { VERSION_DEFAULT };

        self.out.write_all(&LOCAL_HEADER_SIGNATURE.to_le_bytes())?;
        self.out.write_all(&version_needed.to_le_bytes())?;
        self.out.write_all(&flags.to_le_bytes())?;
        self.out.write_all(&method.to_le_bytes())?;
        self.out.write_all(&entry.modified.time.to_le_bytes())?;
        self.out.write_all(&entry.modified.date.to_le_bytes())?;
        // crc32 and sizes follow in the descriptor
        self.out.write_all(&0u32.to_le_bytes())?;
        if zip64 {
            self.out.write_all(&[0xFF; 8])?;
        } else {
            self.out.write_all(&[0u8; 8])?;
        }
        self.out.write_all(&name_len.to_le_bytes())?;
        if zip64 {
            self.out.write_all(&ZIP64_LOCAL_EXTRA_LEN.to_le_bytes())?;
            self.out.write_all(entry.name.as_bytes())?;
            self.out.write_all(&ZIP64_EXTRA_ID.to_le_bytes())?;
            self.out.write_all(&16u16.to_le_bytes())?;
            self.out.write_all(&[0u8; 16])?;
        } else {
            self.out.write_all(&0u16.to_le_bytes())?;
            self.out.write_all(entry.name.as_bytes())?;
        }

        let data_start = self.out.position();
        let mut source = CrcReader::new(reader);
        if method == METHOD_DEFLATE {
            let level = self
                .compression_level
                .map_or_else(Compression::default, |level| Compression::new(u32::from(level)));
            let mut encoder = DeflateEncoder::new(&mut self.out, level);
            copy_with_buffer(&mut source, &mut encoder, &mut self.buffer, cancel)?;
            encoder.finish()?;
        } else {
            copy_with_buffer(&mut source, &mut self.out, &mut self.buffer, cancel)?;
        }

        let crc32 = source.crc32();
        let uncompressed_size = source.bytes_read();
        let compressed_size = self.out.position() - data_start;

        self.out.write_all(&DATA_DESCRIPTOR_SIGNATURE.to_le_bytes())?;
        self.out.write_all(&crc32.to_le_bytes())?;
        if zip64 || needs_zip64(compressed_size) || needs_zip64(uncompressed_size) {
            self.out.write_all(&compressed_size.to_le_bytes())?;
            self.out.write_all(&uncompressed_size.to_le_bytes())?;
        } else {
            self.out.write_all(&(compressed_size as u32).to_le_bytes())?;
            self.out.write_all(&(uncompressed_size as u32).to_le_bytes())?;
        }

        let (version_made_by, external_attrs) = entry
            .unix_mode
            .map_or((version_needed, 0), |mode| (HOST_UNIX | version_needed, mode << 16));

        self.records.push(CentralRecord {
            version_made_by,
            version_needed,
            flags,
            method,
            modified: entry.modified,
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start: 0,
            internal_attrs: 0,
            external_attrs,
            local_header_offset: offset,
            raw_name: entry.name.as_bytes().to_vec(),
            name: entry.name,
            extra: Vec::new(),
            comment: entry.comment,
        });
        Ok(&self.records[self.records.len() - 1])
    }

    /// Copies an entry of another archive without decompressing it.
    ///
    /// Local header, data and data descriptor are copied byte for byte; the
    /// new central record equals `record` except for its offset and comment.
    /// Returns the number of bytes copied.
    pub fn copy_raw_entry<R: Read + Seek>(
        &mut self,
        src: &mut R,
        record: &CentralRecord,
        comment: Vec<u8>,
        cancel: Option<&CancellationToken>,
    ) -> Result<u64> {
        check_comment_len(&comment)?;

        let header = read_local_header(src, record)?;
        let descriptor_len = header.descriptor_len(src, record)?;
        let span = header.data_offset() - header.offset + record.compressed_size + descriptor_len;

        let offset = self.out.position();
        src.seek(SeekFrom::Start(record.local_header_offset))?;
        copy_exact(src, &mut self.out, span, &mut self.buffer, cancel)?;

        let mut copied = record.clone();
        copied.local_header_offset = offset;
        copied.comment = comment;
        self.records.push(copied);
        Ok(span)
    }

    /// Writes the central directory and end records and returns the output.
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = self.out.position();
        for record in &self.records {
            record.write_to(&mut self.out)?;
        }
        let cd_size = self.out.position() - cd_offset;
        let count = self.records.len() as u64;

        if count >= u64::from(u16::MAX) || needs_zip64(cd_size) || needs_zip64(cd_offset) {
            let record_offset = self.out.position();
            self.out.write_all(&ZIP64_EOCD_SIGNATURE.to_le_bytes())?;
            self.out.write_all(&(ZIP64_EOCD_LEN as u64 - 12).to_le_bytes())?;
            self.out.write_all(&VERSION_ZIP64.to_le_bytes())?;
            self.out.write_all(&VERSION_ZIP64.to_le_bytes())?;
            self.out.write_all(&0u32.to_le_bytes())?;
            self.out.write_all(&0u32.to_le_bytes())?;
            self.out.write_all(&count.to_le_bytes())?;
            self.out.write_all(&count.to_le_bytes())?;
            self.out.write_all(&cd_size.to_le_bytes())?;
            self.out.write_all(&cd_offset.to_le_bytes())?;

            self.out.write_all(&ZIP64_LOCATOR_SIGNATURE.to_le_bytes())?;
            self.out.write_all(&0u32.to_le_bytes())?;
            self.out.write_all(&record_offset.to_le_bytes())?;
            self.out.write_all(&1u32.to_le_bytes())?;
        }

        let count16 = u16::try_from(count).unwrap_or(u16::MAX);
        self.out.write_all(&EOCD_SIGNATURE.to_le_bytes())?;
        self.out.write_all(&0u16.to_le_bytes())?;
        self.out.write_all(&0u16.to_le_bytes())?;
        self.out.write_all(&count16.to_le_bytes())?;
        self.out.write_all(&count16.to_le_bytes())?;
        self.out.write_all(&clamp32(cd_size).to_le_bytes())?;
        self.out.write_all(&clamp32(cd_offset).to_le_bytes())?;
        self.out.write_all(&(self.comment.len() as u16).to_le_bytes())?;
        self.out.write_all(&self.comment)?;
        self.out.flush()?;

        Ok(self.out.into_inner())
    }
}

/// [`needs_zip64`] with headroom for DEFLATE output larger than its input.
const fn may_need_zip64(size: u64) -> bool {
    needs_zip64(size.saturating_add(size / 1000).saturating_add(1024))
}

fn check_comment_len(comment: &[u8]) -> Result<()> {
    if comment.len() > MAX_COMMENT_LEN {
        return Err(MetadataError::TooLarge {
            size: comment.len(),
            max: MAX_COMMENT_LEN,
        }
        .into());
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<u16> {
    if name.is_empty() {
        return Err(ZipperError::InvalidEntryName {
            name: name.to_string(),
            reason: "name is empty".into(),
        });
    }
    u16::try_from(name.len()).map_err(|_| ZipperError::InvalidEntryName {
        name: name.to_string(),
        reason: format!("name is {} bytes, exceeding the 65535-byte limit", name.len()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::format::open_entry;
    use crate::format::read_central_directory;
    use crate::format::read_local_header;
    use std::io::Cursor;

    fn read_back(bytes: &[u8], index: usize) -> Vec<u8> {
        let mut cursor = Cursor::new(bytes);
        let dir = read_central_directory(&mut cursor).unwrap();
        let mut data = Vec::new();
        open_entry(&mut cursor, &dir.records[index])
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        data
    }

    #[test]
    fn test_deflate_entry() {
        let payload = b"compressible ".repeat(1000);
        let mut writer = ArchiveWriter::new(Vec::new(), Some(9));
        let record = writer
            .add_entry(NewEntry::new("a.txt"), &mut payload.as_slice(), None)
            .unwrap()
            .clone();

        assert_eq!(record.method, METHOD_DEFLATE);
        assert_eq!(record.uncompressed_size, payload.len() as u64);
        assert!(record.compressed_size < record.uncompressed_size);
        assert_eq!(record.crc32, crc32fast::hash(&payload));
        assert_eq!(record.flags & FLAG_UTF8, FLAG_UTF8);

        let bytes = writer.finish().unwrap();
        assert_eq!(read_back(&bytes, 0), payload);
    }

    #[test]
    fn test_sized_entry_has_plain_local_header() {
        let mut writer = ArchiveWriter::new(Vec::new(), Some(6));
        writer
            .add_entry(NewEntry::new("small.txt").with_size_hint(5), &mut &b"small"[..], None)
            .unwrap();
        let bytes = writer.finish().unwrap();

        let mut cursor = Cursor::new(&bytes);
        let dir = read_central_directory(&mut cursor).unwrap();
        let record = &dir.records[0];
        assert_eq!(record.version_needed, VERSION_DEFAULT);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), VERSION_DEFAULT);

        let header = read_local_header(&mut cursor, record).unwrap();
        assert!(!header.zip64);
        assert_eq!(header.extra_len, 0);
        assert_eq!(header.descriptor_len(&mut cursor, record).unwrap(), 16);
    }

    #[test]
    fn test_unsized_entry_declares_zip64_locally() {
        let mut writer = ArchiveWriter::new(Vec::new(), Some(6));
        writer
            .add_entry(NewEntry::new("stream.bin"), &mut &b"streamed data"[..], None)
            .unwrap();
        let bytes = writer.finish().unwrap();

        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), VERSION_ZIP64);
        assert_eq!(&bytes[18..26], &[0xFF; 8]);

        let mut cursor = Cursor::new(&bytes);
        let dir = read_central_directory(&mut cursor).unwrap();
        let record = &dir.records[0];
        assert_eq!(record.version_needed, VERSION_ZIP64);

        let header = read_local_header(&mut cursor, record).unwrap();
        assert!(header.zip64);
        assert_eq!(header.extra_len, 20);
        // signature, crc32 and two 8-byte sizes
        assert_eq!(header.descriptor_len(&mut cursor, record).unwrap(), 24);
        let descriptor = header.data_offset() + record.compressed_size;
        let end = descriptor + 24;
        assert_eq!(end, dir.cd_offset);
        let sizes = &bytes[descriptor as usize + 8..end as usize];
        assert_eq!(u64::from_le_bytes(sizes[..8].try_into().unwrap()), record.compressed_size);
        assert_eq!(u64::from_le_bytes(sizes[8..].try_into().unwrap()), 13);

        assert_eq!(read_back(&bytes, 0), b"streamed data");
    }

    #[test]
    fn test_size_hint_near_limit_declares_zip64() {
        let mut writer = ArchiveWriter::new(Vec::new(), Some(0));
        let hint = crate::format::ZIP64_THRESHOLD - 1;
        writer
            .add_entry(NewEntry::new("big.bin").with_size_hint(hint), &mut &b"tiny"[..], None)
            .unwrap();
        let bytes = writer.finish().unwrap();

        let mut cursor = Cursor::new(&bytes);
        let dir = read_central_directory(&mut cursor).unwrap();
        let header = read_local_header(&mut cursor, &dir.records[0]).unwrap();
        assert!(header.zip64);
        assert_eq!(read_back(&bytes, 0), b"tiny");
    }

    #[test]
    fn test_stored_entry() {
        let mut writer = ArchiveWriter::new(Vec::new(), Some(0));
        let record = writer
            .add_entry(NewEntry::new("raw.bin"), &mut &b"12345"[..], None)
            .unwrap();
        assert_eq!(record.method, METHOD_STORED);
        assert_eq!(record.compressed_size, 5);

        let bytes = writer.finish().unwrap();
        assert_eq!(read_back(&bytes, 0), b"12345");
    }

    #[test]
    fn test_unix_mode_recorded() {
        let mut writer = ArchiveWriter::new(Vec::new(), None);
        let record = writer
            .add_entry(
                NewEntry::new("run.sh").with_unix_mode(0o100_755),
                &mut &b"#!/bin/sh"[..],
                None,
            )
            .unwrap();
        assert_eq!(record.unix_mode(), Some(0o100_755));
    }

    #[test]
    fn test_rejects_bad_names_and_comments() {
        let mut writer = ArchiveWriter::new(Vec::new(), None);
        let err = writer
            .add_entry(NewEntry::new(""), &mut &b""[..], None)
            .unwrap_err();
        assert!(matches!(err, ZipperError::InvalidEntryName { .. }));
        assert_eq!(writer.position(), 0);

        let entry = NewEntry::new("a").with_comment(vec![b'x'; MAX_COMMENT_LEN + 1]);
        let err = writer.add_entry(entry, &mut &b""[..], None).unwrap_err();
        assert!(err.is_encoding_error());

        let err = writer.set_comment(vec![0; MAX_COMMENT_LEN + 1]).unwrap_err();
        assert!(err.is_encoding_error());
        assert!(writer.set_comment(vec![0; MAX_COMMENT_LEN]).is_ok());
    }

    #[test]
    fn test_cancelled_entry_is_not_recorded() {
        let token = CancellationToken::new();
        token.cancel();
        let mut writer = ArchiveWriter::new(Vec::new(), None);
        let err = writer
            .add_entry(NewEntry::new("a"), &mut &b"data"[..], Some(&token))
            .unwrap_err();
        assert!(matches!(err, ZipperError::Cancelled));
        assert!(writer.records().is_empty());

        let bytes = writer.finish().unwrap();
        let dir = read_central_directory(&mut Cursor::new(bytes)).unwrap();
        assert!(dir.records.is_empty());
    }

    #[test]
    fn test_raw_copy_preserves_entry_bytes() {
        let mut source = ArchiveWriter::new(Vec::new(), Some(6));
        source
            .add_entry(
                NewEntry::new("one.txt").with_comment(b"first".to_vec()),
                &mut &b"one"[..],
                None,
            )
            .unwrap();
        source
            .add_entry(NewEntry::new("two.txt"), &mut &b"two two"[..], None)
            .unwrap();
        let original = source.finish().unwrap();

        let mut cursor = Cursor::new(&original);
        let dir = read_central_directory(&mut cursor).unwrap();
        let mut copy = ArchiveWriter::new(Vec::new(), Some(6));
        for record in &dir.records {
            copy.copy_raw_entry(&mut cursor, record, b"new".to_vec(), None)
                .unwrap();
        }
        let rewritten = copy.finish().unwrap();

        // entry data region is identical
        assert_eq!(rewritten[..dir.cd_offset as usize], original[..dir.cd_offset as usize]);
        let new_dir = read_central_directory(&mut Cursor::new(&rewritten)).unwrap();
        assert_eq!(new_dir.records[0].comment, b"new");
        assert_eq!(new_dir.records[1].crc32, dir.records[1].crc32);
        assert_eq!(read_back(&rewritten, 1), b"two two");
    }
}
