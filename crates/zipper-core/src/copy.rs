//! Chunked copy with a reusable buffer.
//!
//! Entry content is never held in memory as a whole: both the entry writer
//! and the rewriter stream through a single 64 KiB buffer, checking an
//! optional [`CancellationToken`] before every chunk.

use std::io::Read;
use std::io::Write;
use std::io::{self};

use crate::CancellationToken;
use crate::Result;
use crate::ZipperError;

/// Buffer size for chunked copies (64 KiB).
pub const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Heap-allocated buffer reused across copies.
///
/// # Examples
///
/// ```
/// use std::io::Cursor;
/// use zipper_core::copy::{CopyBuffer, copy_with_buffer};
///
/// let mut buffer = CopyBuffer::new();
/// let mut input = Cursor::new(b"payload".to_vec());
/// let mut output = Vec::new();
///
/// let copied = copy_with_buffer(&mut input, &mut output, &mut buffer, None)?;
/// assert_eq!(copied, 7);
/// # Ok::<(), zipper_core::ZipperError>(())
/// ```
#[derive(Debug)]
pub struct CopyBuffer {
    buf: Box<[u8]>,
}

impl CopyBuffer {
    /// Creates a new zeroed buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; COPY_BUFFER_SIZE].into_boxed_slice(),
        }
    }

    /// Returns the buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.buf.len()
    }
}

impl Default for CopyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Copies `reader` to `writer` until EOF.
///
/// Returns the number of bytes copied. Interrupted reads are retried.
///
/// # Errors
///
/// Returns [`ZipperError::Cancelled`] if `cancel` is triggered between
/// chunks, and [`ZipperError::Io`] for read or write failures.
pub fn copy_with_buffer<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    buffer: &mut CopyBuffer,
    cancel: Option<&CancellationToken>,
) -> Result<u64> {
    let mut total: u64 = 0;

    loop {
        if let Some(token) = cancel {
            token.check()?;
        }

        let bytes_read = match reader.read(&mut buffer.buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ZipperError::Io(e)),
        };

        writer.write_all(&buffer.buf[..bytes_read])?;
        total += bytes_read as u64;
    }

    Ok(total)
}

/// Copies exactly `len` bytes from `reader` to `writer`.
///
/// # Errors
///
/// Same as [`copy_with_buffer`], plus [`ZipperError::CorruptArchive`] if the
/// reader ends before `len` bytes were read.
pub fn copy_exact<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    len: u64,
    buffer: &mut CopyBuffer,
    cancel: Option<&CancellationToken>,
) -> Result<u64> {
    let copied = copy_with_buffer(&mut reader.take(len), writer, buffer, cancel)?;
    if copied != len {
        return Err(ZipperError::corrupt(format!(
            "unexpected end of data: expected {len} bytes, found {copied}"
        )));
    }
    Ok(copied)
}
