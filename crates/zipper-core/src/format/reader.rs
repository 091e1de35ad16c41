//! Central directory parsing and local header access.

use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use flate2::read::DeflateDecoder;
use tracing::debug;

use crate::Result;
use crate::ZipperError;

use super::CENTRAL_HEADER_LEN;
use super::CENTRAL_HEADER_SIGNATURE;
use super::CentralDirectory;
use super::CentralRecord;
use super::DATA_DESCRIPTOR_SIGNATURE;
use super::DosDateTime;
use super::EOCD_LEN;
use super::EOCD_SIGNATURE;
use super::LOCAL_HEADER_LEN;
use super::LOCAL_HEADER_SIGNATURE;
use super::METHOD_DEFLATE;
use super::METHOD_STORED;
use super::ZIP64_EOCD_LEN;
use super::ZIP64_EOCD_SIGNATURE;
use super::ZIP64_EXTRA_ID;
use super::ZIP64_LOCATOR_LEN;
use super::ZIP64_LOCATOR_SIGNATURE;
use super::ZIP64_THRESHOLD;
use super::needs_zip64;

/// Largest possible EOCD record including its comment.
const MAX_EOCD_SEARCH: u64 = EOCD_LEN as u64 + u16::MAX as u64;

/// Bounds-checked little-endian reader over a byte slice.
struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| ZipperError::corrupt("truncated central directory"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let b = self.bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Where the central directory lives, as recorded by the EOCD.
#[derive(Debug)]
struct EndRecord {
    offset: u64,
    entries: u64,
    cd_size: u64,
    cd_offset: u64,
    comment: Vec<u8>,
}

/// Parses the central directory and archive comment.
///
/// # Errors
///
/// Returns [`ZipperError::CorruptArchive`] if the end of central directory
/// record is missing, points outside the file, or a central record is
/// truncated or has a bad signature.
pub fn read_central_directory<R: Read + Seek>(src: &mut R) -> Result<CentralDirectory> {
    let file_size = src.seek(SeekFrom::End(0))?;
    let end = find_end_record(src, file_size)?;

    let cd_end = end
        .cd_offset
        .checked_add(end.cd_size)
        .filter(|cd_end| *cd_end <= end.offset)
        .ok_or_else(|| {
            ZipperError::corrupt(format!(
                "central directory ({} bytes at offset {}) extends past its end record",
                end.cd_size, end.cd_offset
            ))
        })?;
    debug!(
        entries = end.entries,
        cd_offset = end.cd_offset,
        cd_end,
        "reading central directory"
    );

    let mut raw = vec![0u8; end.cd_size as usize];
    src.seek(SeekFrom::Start(end.cd_offset))?;
    read_exact_or_corrupt(src, &mut raw, "central directory")?;

    let mut cursor = ByteCursor::new(&raw);
    let capacity = usize::try_from(end.entries).unwrap_or(0).min(raw.len() / CENTRAL_HEADER_LEN);
    let mut records = Vec::with_capacity(capacity);
    for index in 0..end.entries {
        if cursor.remaining() < CENTRAL_HEADER_LEN {
            return Err(ZipperError::corrupt(format!(
                "central directory ends after {index} of {} entries",
                end.entries
            )));
        }
        records.push(parse_central_record(&mut cursor)?);
    }

    Ok(CentralDirectory {
        records,
        comment: end.comment,
        cd_offset: end.cd_offset,
        cd_size: end.cd_size,
    })
}

fn find_end_record<R: Read + Seek>(src: &mut R, file_size: u64) -> Result<EndRecord> {
    if file_size < EOCD_LEN as u64 {
        return Err(ZipperError::corrupt(format!(
            "file is {file_size} bytes, too small for an end of central directory record"
        )));
    }

    let search_start = file_size.saturating_sub(MAX_EOCD_SEARCH);
    src.seek(SeekFrom::Start(search_start))?;
    let mut tail = Vec::with_capacity((file_size - search_start) as usize);
    src.read_to_end(&mut tail)?;

    // Prefer the record whose comment ends exactly at EOF; fall back to the
    // last well-formed candidate for archives with trailing bytes.
    let signature = EOCD_SIGNATURE.to_le_bytes();
    let mut fallback = None;
    let mut found = None;
    for i in (0..=tail.len() - EOCD_LEN).rev() {
        if tail[i..i + 4] != signature {
            continue;
        }
        let comment_len = u16::from_le_bytes([tail[i + 20], tail[i + 21]]) as usize;
        let comment_end = i + EOCD_LEN + comment_len;
        if comment_end == tail.len() {
            found = Some(i);
            break;
        }
        if comment_end < tail.len() && fallback.is_none() {
            fallback = Some(i);
        }
    }

    let pos = found
        .or(fallback)
        .ok_or_else(|| ZipperError::corrupt("end of central directory record not found"))?;

    let mut cursor = ByteCursor::new(&tail[pos + 4..]);
    let _disk = cursor.u16()?;
    let _cd_disk = cursor.u16()?;
    let _entries_on_disk = cursor.u16()?;
    let entries = cursor.u16()?;
    let cd_size = cursor.u32()?;
    let cd_offset = cursor.u32()?;
    let comment_len = cursor.u16()? as usize;
    let comment = cursor.bytes(comment_len)?.to_vec();

    let offset = search_start + pos as u64;
    let mut end = EndRecord {
        offset,
        entries: u64::from(entries),
        cd_size: u64::from(cd_size),
        cd_offset: u64::from(cd_offset),
        comment,
    };

    let uses_markers = entries == u16::MAX
        || u64::from(cd_size) == ZIP64_THRESHOLD
        || u64::from(cd_offset) == ZIP64_THRESHOLD;
    if uses_markers && let Some(zip64) = read_zip64_end(src, offset)? {
        end.entries = zip64.entries;
        end.cd_size = zip64.cd_size;
        end.cd_offset = zip64.cd_offset;
        end.offset = zip64.offset;
    }

    Ok(end)
}

/// Reads the ZIP64 end record through the locator preceding the EOCD.
///
/// Returns `Ok(None)` when there is no locator, in which case the 32-bit
/// values are taken at face value.
fn read_zip64_end<R: Read + Seek>(src: &mut R, eocd_offset: u64) -> Result<Option<EndRecord>> {
    let Some(locator_offset) = eocd_offset.checked_sub(ZIP64_LOCATOR_LEN as u64) else {
        return Ok(None);
    };

    let mut locator = [0u8; ZIP64_LOCATOR_LEN];
    src.seek(SeekFrom::Start(locator_offset))?;
    read_exact_or_corrupt(src, &mut locator, "ZIP64 locator")?;
    let mut cursor = ByteCursor::new(&locator);
    if cursor.u32()? != ZIP64_LOCATOR_SIGNATURE {
        return Ok(None);
    }
    let _disk = cursor.u32()?;
    let record_offset = cursor.u64()?;

    if record_offset
        .checked_add(ZIP64_EOCD_LEN as u64)
        .is_none_or(|end| end > locator_offset)
    {
        return Err(ZipperError::corrupt(
            "ZIP64 end of central directory offset is out of range",
        ));
    }

    let mut record = [0u8; ZIP64_EOCD_LEN];
    src.seek(SeekFrom::Start(record_offset))?;
    read_exact_or_corrupt(src, &mut record, "ZIP64 end of central directory")?;
    let mut cursor = ByteCursor::new(&record);
    if cursor.u32()? != ZIP64_EOCD_SIGNATURE {
        return Err(ZipperError::corrupt(
            "invalid ZIP64 end of central directory signature",
        ));
    }
    let _size = cursor.u64()?;
    let _made_by = cursor.u16()?;
    let _needed = cursor.u16()?;
    let _disk = cursor.u32()?;
    let _cd_disk = cursor.u32()?;
    let _entries_on_disk = cursor.u64()?;
    let entries = cursor.u64()?;
    let cd_size = cursor.u64()?;
    let cd_offset = cursor.u64()?;

    Ok(Some(EndRecord {
        offset: record_offset,
        entries,
        cd_size,
        cd_offset,
        comment: Vec::new(),
    }))
}

fn parse_central_record(cursor: &mut ByteCursor<'_>) -> Result<CentralRecord> {
    let signature = cursor.u32()?;
    if signature != CENTRAL_HEADER_SIGNATURE {
        return Err(ZipperError::corrupt(format!(
            "invalid central directory signature 0x{signature:08x}"
        )));
    }

    let version_made_by = cursor.u16()?;
    let version_needed = cursor.u16()?;
    let flags = cursor.u16()?;
    let method = cursor.u16()?;
    let time = cursor.u16()?;
    let date = cursor.u16()?;
    let crc32 = cursor.u32()?;
    let compressed_32 = cursor.u32()?;
    let uncompressed_32 = cursor.u32()?;
    let name_len = cursor.u16()? as usize;
    let extra_len = cursor.u16()? as usize;
    let comment_len = cursor.u16()? as usize;
    let disk_start = cursor.u16()?;
    let internal_attrs = cursor.u16()?;
    let external_attrs = cursor.u32()?;
    let offset_32 = cursor.u32()?;
    let raw_name = cursor.bytes(name_len)?.to_vec();
    let raw_extra = cursor.bytes(extra_len)?;
    let comment = cursor.bytes(comment_len)?.to_vec();

    let mut record = CentralRecord {
        version_made_by,
        version_needed,
        flags,
        method,
        modified: DosDateTime { time, date },
        crc32,
        compressed_size: u64::from(compressed_32),
        uncompressed_size: u64::from(uncompressed_32),
        disk_start,
        internal_attrs,
        external_attrs,
        local_header_offset: u64::from(offset_32),
        name: String::from_utf8_lossy(&raw_name).into_owned(),
        raw_name,
        extra: Vec::with_capacity(extra_len),
        comment,
    };
    apply_extra_fields(&mut record, raw_extra)?;
    Ok(record)
}

/// Resolves ZIP64 values and keeps every other extra field verbatim.
fn apply_extra_fields(record: &mut CentralRecord, extra: &[u8]) -> Result<()> {
    let mut cursor = ByteCursor::new(extra);
    while cursor.remaining() >= 4 {
        let start = cursor.pos;
        let id = cursor.u16()?;
        let len = cursor.u16()? as usize;
        let data = cursor.bytes(len).map_err(|_| {
            ZipperError::corrupt(format!("extra field of entry '{}' is truncated", record.name))
        })?;

        if id != ZIP64_EXTRA_ID {
            record.extra.extend_from_slice(&extra[start..cursor.pos]);
            continue;
        }

        let mut values = ByteCursor::new(data);
        if record.uncompressed_size == ZIP64_THRESHOLD {
            record.uncompressed_size = values.u64()?;
        }
        if record.compressed_size == ZIP64_THRESHOLD {
            record.compressed_size = values.u64()?;
        }
        if record.local_header_offset == ZIP64_THRESHOLD {
            record.local_header_offset = values.u64()?;
        }
    }
    // Trailing padding shorter than a field header is kept as-is.
    record.extra.extend_from_slice(&extra[cursor.pos..]);
    Ok(())
}

/// Layout of a local file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalHeader {
    /// Offset of the header itself.
    pub offset: u64,
    /// General purpose flags as stored locally.
    pub flags: u16,
    /// Length of the name field.
    pub name_len: u16,
    /// Length of the extra field.
    pub extra_len: u16,
    /// Whether the local extra field carries ZIP64 sizes.
    pub zip64: bool,
}

impl LocalHeader {
    /// Offset of the first byte of entry data.
    #[must_use]
    pub const fn data_offset(&self) -> u64 {
        self.offset + LOCAL_HEADER_LEN as u64 + self.name_len as u64 + self.extra_len as u64
    }

    /// Length of the data descriptor following the data of `record`.
    ///
    /// The leading signature is optional, so the stream is probed for it.
    pub fn descriptor_len<R: Read + Seek>(
        &self,
        src: &mut R,
        record: &CentralRecord,
    ) -> Result<u64> {
        if self.flags & super::FLAG_DATA_DESCRIPTOR == 0 {
            return Ok(0);
        }

        let mut signature = [0u8; 4];
        src.seek(SeekFrom::Start(self.data_offset() + record.compressed_size))?;
        read_exact_or_corrupt(src, &mut signature, "data descriptor")?;

        let sizes = if self.zip64
            || needs_zip64(record.compressed_size)
            || needs_zip64(record.uncompressed_size)
        {
            16
        } else {
            8
        };
        let signature_len = if u32::from_le_bytes(signature) == DATA_DESCRIPTOR_SIGNATURE {
            4
        } else {
            0
        };
        Ok(signature_len + 4 + sizes)
    }
}

/// Reads the local file header of `record`.
pub fn read_local_header<R: Read + Seek>(src: &mut R, record: &CentralRecord) -> Result<LocalHeader> {
    let mut fixed = [0u8; LOCAL_HEADER_LEN];
    src.seek(SeekFrom::Start(record.local_header_offset))?;
    read_exact_or_corrupt(src, &mut fixed, "local file header")?;

    let mut cursor = ByteCursor::new(&fixed);
    if cursor.u32()? != LOCAL_HEADER_SIGNATURE {
        return Err(ZipperError::corrupt(format!(
            "invalid local header signature for entry '{}'",
            record.name
        )));
    }
    let _version = cursor.u16()?;
    let flags = cursor.u16()?;
    cursor.bytes(18)?;
    let name_len = cursor.u16()?;
    let extra_len = cursor.u16()?;

    let mut name_and_extra = vec![0u8; usize::from(name_len) + usize::from(extra_len)];
    read_exact_or_corrupt(src, &mut name_and_extra, "local file header")?;
    let zip64 = has_extra_field(&name_and_extra[usize::from(name_len)..], ZIP64_EXTRA_ID);

    Ok(LocalHeader {
        offset: record.local_header_offset,
        flags,
        name_len,
        extra_len,
        zip64,
    })
}

fn has_extra_field(extra: &[u8], wanted: u16) -> bool {
    let mut pos = 0usize;
    while pos + 4 <= extra.len() {
        let id = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let len = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        if id == wanted {
            return true;
        }
        pos += 4 + len;
    }
    false
}

/// Opens a decompressing reader over the data of `record`.
///
/// # Errors
///
/// Returns [`ZipperError::UnsupportedCompression`] for methods other than
/// stored and DEFLATE.
pub fn open_entry<'a, R: Read + Seek>(
    src: &'a mut R,
    record: &CentralRecord,
) -> Result<Box<dyn Read + 'a>> {
    if record.method != METHOD_STORED && record.method != METHOD_DEFLATE {
        return Err(ZipperError::UnsupportedCompression(record.method));
    }

    let header = read_local_header(src, record)?;
    src.seek(SeekFrom::Start(header.data_offset()))?;
    let limited = src.take(record.compressed_size);

    if record.method == METHOD_DEFLATE {
        Ok(Box::new(DeflateDecoder::new(limited)))
    } else {
        Ok(Box::new(limited))
    }
}

fn read_exact_or_corrupt<R: Read>(src: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    src.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            ZipperError::corrupt(format!("unexpected end of file in {what}"))
        } else {
            ZipperError::Io(e)
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::format::ArchiveWriter;
    use crate::format::NewEntry;
    use std::io::Cursor;

    fn archive(entries: &[(&str, &str, &str)], comment: &[u8]) -> Vec<u8> {
        let mut writer = ArchiveWriter::new(Vec::new(), Some(6));
        for (name, data, entry_comment) in entries {
            let entry = NewEntry::new(*name)
                .with_size_hint(data.len() as u64)
                .with_comment(entry_comment.as_bytes().to_vec());
            writer.add_entry(entry, &mut data.as_bytes(), None).unwrap();
        }
        writer.set_comment(comment.to_vec()).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_reads_records_and_comments() {
        let bytes = archive(
            &[("a.txt", "alpha", r#"{"a":1}"#), ("b.txt", "beta", "")],
            br#"{"project":"demo"}"#,
        );
        let dir = read_central_directory(&mut Cursor::new(&bytes)).unwrap();

        assert_eq!(dir.records.len(), 2);
        assert_eq!(dir.records[0].name, "a.txt");
        assert_eq!(dir.records[0].comment, br#"{"a":1}"#);
        assert!(dir.records[1].comment.is_empty());
        assert_eq!(dir.comment, br#"{"project":"demo"}"#);
        assert_eq!(dir.records[1].uncompressed_size, 4);
    }

    #[test]
    fn test_eocd_invariant_holds() {
        let comment = b"archive comment";
        let bytes = archive(&[("a", "x", "")], comment);
        let dir = read_central_directory(&mut Cursor::new(&bytes)).unwrap();
        let eocd_offset = dir.cd_offset + dir.cd_size;
        assert_eq!(eocd_offset + EOCD_LEN as u64 + comment.len() as u64, bytes.len() as u64);
    }

    #[test]
    fn test_comment_containing_eocd_signature() {
        // The embedded record's length field does not end at EOF.
        let mut comment = b"xx".to_vec();
        comment.extend_from_slice(&EOCD_SIGNATURE.to_le_bytes());
        comment.extend_from_slice(&[1u8; 18]);
        let bytes = archive(&[("a", "x", "")], &comment);

        let dir = read_central_directory(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(dir.comment, comment);
        assert_eq!(dir.records.len(), 1);
    }

    #[test]
    fn test_empty_archive() {
        let bytes = archive(&[], b"");
        assert_eq!(bytes.len(), EOCD_LEN);
        let dir = read_central_directory(&mut Cursor::new(&bytes)).unwrap();
        assert!(dir.records.is_empty());
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let err = read_central_directory(&mut Cursor::new(b"not a zip file at all".to_vec()))
            .unwrap_err();
        assert!(err.is_corrupt());

        let err =
            read_central_directory(&mut Cursor::new(vec![0u8; 4096])).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_truncated_central_directory_is_corrupt() {
        let bytes = archive(&[("a.txt", "alpha", "c"), ("b.txt", "beta", "")], b"");
        let dir = read_central_directory(&mut Cursor::new(&bytes)).unwrap();

        // Cut into the middle of the central directory: no EOCD remains.
        let cut = (dir.cd_offset + dir.cd_size / 2) as usize;
        let err = read_central_directory(&mut Cursor::new(bytes[..cut].to_vec())).unwrap_err();
        assert!(err.is_corrupt());

        // Keep the EOCD but claim one more entry than is present.
        let mut lying = bytes.clone();
        let eocd = lying.len() - EOCD_LEN;
        lying[eocd + 10] = 3;
        let err = read_central_directory(&mut Cursor::new(lying)).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_cd_offset_out_of_range_is_corrupt() {
        let mut bytes = archive(&[("a.txt", "alpha", "")], b"");
        let eocd = bytes.len() - EOCD_LEN;
        bytes[eocd + 16..eocd + 20].copy_from_slice(&0x00FF_FFFFu32.to_le_bytes());
        let err = read_central_directory(&mut Cursor::new(bytes)).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_local_header_and_descriptor() {
        let bytes = archive(&[("name.bin", "0123456789", "")], b"");
        let mut cursor = Cursor::new(&bytes);
        let dir = read_central_directory(&mut cursor).unwrap();
        let record = &dir.records[0];

        let header = read_local_header(&mut cursor, record).unwrap();
        assert_eq!(header.name_len, 8);
        assert_eq!(header.data_offset(), LOCAL_HEADER_LEN as u64 + 8);
        assert_eq!(header.descriptor_len(&mut cursor, record).unwrap(), 16);

        let mut data = Vec::new();
        open_entry(&mut cursor, record)
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        assert_eq!(data, b"0123456789");
    }

    #[test]
    fn test_unsupported_method() {
        let bytes = archive(&[("a", "x", "")], b"");
        let mut cursor = Cursor::new(&bytes);
        let mut record = read_central_directory(&mut cursor).unwrap().records.remove(0);
        record.method = 14;
        assert!(matches!(
            open_entry(&mut cursor, &record).err(),
            Some(ZipperError::UnsupportedCompression(14))
        ));
    }

    #[test]
    fn test_zip64_extra_resolution_preserves_other_fields() {
        let mut record = CentralRecord {
            version_made_by: 20,
            version_needed: 45,
            flags: 0,
            method: 0,
            modified: DosDateTime::default(),
            crc32: 0,
            compressed_size: 10,
            uncompressed_size: ZIP64_THRESHOLD,
            disk_start: 0,
            internal_attrs: 0,
            external_attrs: 0,
            local_header_offset: ZIP64_THRESHOLD,
            raw_name: b"big".to_vec(),
            name: "big".into(),
            extra: Vec::new(),
            comment: Vec::new(),
        };
        let mut extra = Vec::new();
        extra.extend_from_slice(&0x5455u16.to_le_bytes());
        extra.extend_from_slice(&1u16.to_le_bytes());
        extra.push(0);
        extra.extend_from_slice(&ZIP64_EXTRA_ID.to_le_bytes());
        extra.extend_from_slice(&16u16.to_le_bytes());
        extra.extend_from_slice(&6_000_000_000u64.to_le_bytes());
        extra.extend_from_slice(&7_000_000_000u64.to_le_bytes());

        apply_extra_fields(&mut record, &extra).unwrap();
        assert_eq!(record.uncompressed_size, 6_000_000_000);
        assert_eq!(record.compressed_size, 10);
        assert_eq!(record.local_header_offset, 7_000_000_000);
        assert_eq!(record.extra, vec![0x55, 0x54, 1, 0, 0]);
    }
}
