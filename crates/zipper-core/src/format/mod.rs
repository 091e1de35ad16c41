//! ZIP container plumbing.
//!
//! A small subset of the format: stored and DEFLATE entries,
//! data descriptors, ZIP64 sizes and offsets, and byte-exact access to both
//! comment fields. Higher layers never touch raw offsets; they go through
//! [`read_central_directory`], [`ArchiveWriter`] and [`open_entry`].

mod reader;
mod record;
mod time;
mod writer;

pub use reader::LocalHeader;
pub use reader::open_entry;
pub use reader::read_central_directory;
pub use reader::read_local_header;
pub use record::CentralDirectory;
pub use record::CentralRecord;
pub use time::DosDateTime;
pub use writer::ArchiveWriter;
pub use writer::NewEntry;

/// Local file header signature (`PK\x03\x04`).
pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4b50;
/// Central directory file header signature (`PK\x01\x02`).
pub const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4b50;
/// End of central directory signature (`PK\x05\x06`).
pub const EOCD_SIGNATURE: u32 = 0x0605_4b50;
/// ZIP64 end of central directory record signature (`PK\x06\x06`).
pub const ZIP64_EOCD_SIGNATURE: u32 = 0x0606_4b50;
/// ZIP64 end of central directory locator signature (`PK\x06\x07`).
pub const ZIP64_LOCATOR_SIGNATURE: u32 = 0x0706_4b50;
/// Optional data descriptor signature (`PK\x07\x08`).
pub const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x0807_4b50;

/// Fixed part of a local file header.
pub const LOCAL_HEADER_LEN: usize = 30;
/// Fixed part of a central directory file header.
pub const CENTRAL_HEADER_LEN: usize = 46;
/// Fixed part of the end of central directory record.
pub const EOCD_LEN: usize = 22;
/// Size of the ZIP64 end of central directory record.
pub const ZIP64_EOCD_LEN: usize = 56;
/// Size of the ZIP64 end of central directory locator.
pub const ZIP64_LOCATOR_LEN: usize = 20;

/// Sizes, offsets and counts are stored in ZIP64 fields from this value on.
pub const ZIP64_THRESHOLD: u64 = u32::MAX as u64;
/// ZIP64 extended information extra field id.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// Bit 3: sizes and CRC follow the data in a descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// Bit 11: name and comment are UTF-8.
pub const FLAG_UTF8: u16 = 1 << 11;

/// Stored (no compression).
pub const METHOD_STORED: u16 = 0;
/// DEFLATE.
pub const METHOD_DEFLATE: u16 = 8;

/// Version 2.0: DEFLATE and data descriptors.
pub const VERSION_DEFAULT: u16 = 20;
/// Version 4.5: ZIP64.
pub const VERSION_ZIP64: u16 = 45;

pub(crate) const fn needs_zip64(value: u64) -> bool {
    value >= ZIP64_THRESHOLD
}
