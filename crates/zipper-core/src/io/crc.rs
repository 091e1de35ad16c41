//! Reader adapter that hashes what passes through it.

use std::io::Read;

use crc32fast::Hasher;

/// Computes the CRC-32 and length of everything read through it.
///
/// # Examples
///
/// ```
/// use std::io::Read;
/// use zipper_core::io::CrcReader;
///
/// let mut reader = CrcReader::new(&b"hello"[..]);
/// std::io::copy(&mut reader, &mut std::io::sink())?;
/// assert_eq!(reader.bytes_read(), 5);
/// assert_eq!(reader.crc32(), crc32fast::hash(b"hello"));
/// # Ok::<(), std::io::Error>(())
/// ```
#[derive(Debug)]
pub struct CrcReader<R> {
    inner: R,
    hasher: Hasher,
    bytes_read: u64,
}

impl<R> CrcReader<R> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Hasher::new(),
            bytes_read: 0,
        }
    }

    /// CRC-32 of the bytes read so far.
    #[must_use]
    pub fn crc32(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Number of bytes read so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Unwraps the inner reader.
    #[must_use]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CrcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}
