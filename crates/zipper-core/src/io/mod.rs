//! I/O wrappers used by the archive writer and reader.

pub mod counting;
pub mod crc;

pub use counting::CountingWriter;
pub use crc::CrcReader;
