//! Archive sessions: create an archive with metadata, or read one back.
//!
//! A session is opened in one [`OpenMode`] and stays in it until closed.
//! Write sessions stream entries into the file as they are added and write
//! the central directory on [`ArchiveSession::close`] (or on drop). Read
//! sessions parse the central directory once at open time.
//!
//! Metadata on an archive that has already been closed is changed through
//! [`MetadataRewriter`](crate::MetadataRewriter), never through a session.

mod entries;

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::CancellationToken;
use crate::OverwritePolicy;
use crate::Result;
use crate::ZipperConfig;
use crate::ZipperError;
use crate::copy::CopyBuffer;
use crate::copy::copy_with_buffer;
use crate::format::ArchiveWriter;
use crate::format::CentralDirectory;
use crate::format::CentralRecord;
use crate::format::DosDateTime;
use crate::format::NewEntry;
use crate::format::open_entry;
use crate::format::read_central_directory;
use crate::io::CrcReader;
use crate::metadata::CacheKey;
use crate::metadata::MetadataTarget;
use crate::metadata::codec;

pub use entries::EntryInfo;

/// Mode requested when opening a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Inspect an existing archive.
    Read,
    /// Create a new archive.
    Write,
}

/// Lifecycle state of an [`ArchiveSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Accepting new entries.
    OpenWrite,
    /// Central directory loaded.
    OpenRead,
    /// Closed; every operation fails.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenWrite => write!(f, "open for writing"),
            Self::OpenRead => write!(f, "open for reading"),
            Self::Closed => write!(f, "not opened"),
        }
    }
}

enum Inner {
    Write(ArchiveWriter<BufWriter<File>>),
    Read {
        file: BufReader<File>,
        directory: CentralDirectory,
    },
    Closed,
}

impl Inner {
    const fn state(&self) -> SessionState {
        match self {
            Self::Write(_) => SessionState::OpenWrite,
            Self::Read { .. } => SessionState::OpenRead,
            Self::Closed => SessionState::Closed,
        }
    }

    fn records(&self) -> &[CentralRecord] {
        match self {
            Self::Write(writer) => writer.records(),
            Self::Read { directory, .. } => &directory.records,
            Self::Closed => &[],
        }
    }
}

/// An open ZIP archive carrying JSON metadata.
///
/// # Examples
///
/// ```no_run
/// use serde_json::json;
/// use zipper_core::{ArchiveSession, OpenMode};
///
/// let mut session = ArchiveSession::open("bundle.zip", OpenMode::Write)?;
/// session.add_file("doc.txt", Some(&json!({"type": "text"})))?;
/// session.set_archive_metadata(&json!({"project": "demo"}))?;
/// session.close()?;
///
/// let session = ArchiveSession::open("bundle.zip", OpenMode::Read)?;
/// assert_eq!(
///     session.get_file_metadata("doc.txt")?,
///     Some(json!({"type": "text"}))
/// );
/// # Ok::<(), zipper_core::ZipperError>(())
/// ```
pub struct ArchiveSession {
    path: PathBuf,
    mode: OpenMode,
    config: ZipperConfig,
    inner: Inner,
    names: HashSet<String>,
    cancel: Option<CancellationToken>,
    cache_generation: u64,
}

impl fmt::Debug for ArchiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveSession")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl ArchiveSession {
    /// Opens a session with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`open_with`](Self::open_with).
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        Self::open_with(path, mode, &ZipperConfig::default())
    }

    /// Opens a session.
    ///
    /// # Errors
    ///
    /// In write mode, returns [`ZipperError::AlreadyExists`] if the path
    /// exists and the overwrite policy is [`OverwritePolicy::Reject`]. In
    /// read mode, returns [`ZipperError::NotFound`] for a missing path and
    /// [`ZipperError::CorruptArchive`] if the central directory cannot be
    /// parsed.
    pub fn open_with<P: AsRef<Path>>(path: P, mode: OpenMode, config: &ZipperConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        // must be taken before the central directory is read
        let cache_generation = config.cache.generation(&path);

        let inner = match mode {
            OpenMode::Write => {
                let file = create_archive_file(&path, config.overwrite)?;
                debug!(path = %path.display(), policy = ?config.overwrite, "opened archive for writing");
                Inner::Write(ArchiveWriter::new(
                    BufWriter::new(file),
                    config.compression_level,
                ))
            }
            OpenMode::Read => {
                let file = File::open(&path).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        ZipperError::NotFound { path: path.clone() }
                    } else {
                        ZipperError::Io(e)
                    }
                })?;
                let mut file = BufReader::new(file);
                let directory = read_central_directory(&mut file)?;
                debug!(
                    path = %path.display(),
                    entries = directory.records.len(),
                    "opened archive for reading"
                );
                Inner::Read { file, directory }
            }
        };

        Ok(Self {
            path,
            mode,
            config: config.clone(),
            inner,
            names: HashSet::new(),
            cancel: None,
            cache_generation,
        })
    }

    /// Opens a session, runs `f`, and closes the session.
    ///
    /// The session is closed even when `f` fails; an error from `f` takes
    /// precedence over an error from closing.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use serde_json::json;
    /// use zipper_core::{ArchiveSession, OpenMode, ZipperConfig};
    ///
    /// ArchiveSession::scoped("out.zip", OpenMode::Write, &ZipperConfig::default(), |zip| {
    ///     zip.add_bytes("notes.txt", b"hello", Some(&json!({"lang": "en"})))?;
    ///     zip.set_archive_metadata(&json!({"version": 1}))
    /// })?;
    /// # Ok::<(), zipper_core::ZipperError>(())
    /// ```
    pub fn scoped<P, T, F>(path: P, mode: OpenMode, config: &ZipperConfig, f: F) -> Result<T>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let mut session = Self::open_with(path, mode, config)?;
        let result = f(&mut session);
        let closed = session.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Path the session was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the session was opened in.
    #[must_use]
    pub const fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Configuration of this session.
    #[must_use]
    pub const fn config(&self) -> &ZipperConfig {
        &self.config
    }

    /// Installs a token checked between chunks while adding files.
    pub fn set_cancel_token(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
    }

    /// Adds a file under its own file name.
    ///
    /// # Errors
    ///
    /// See [`add_file_as`](Self::add_file_as); additionally
    /// [`ZipperError::InvalidSource`] if the path has no UTF-8 file name.
    pub fn add_file<P: AsRef<Path>>(&mut self, source: P, metadata: Option<&Value>) -> Result<()> {
        self.require_write("add file")?;
        let source = source.as_ref();
        let name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ZipperError::InvalidSource {
                path: source.to_path_buf(),
                reason: "file name is missing or not valid UTF-8".into(),
            })?
            .to_string();
        self.add_file_as(source, &name, metadata)
    }

    /// Adds a file under an explicit entry name.
    ///
    /// Content is streamed in fixed-size chunks. The modification time and,
    /// on Unix, the permission bits are taken from the source file.
    ///
    /// # Errors
    ///
    /// - [`ZipperError::InvalidState`] unless open for writing
    /// - [`ZipperError::SourceNotFound`] if `source` does not exist
    /// - [`ZipperError::InvalidSource`] if it is not a regular file
    /// - [`ZipperError::DuplicateEntry`] if `name` was already added
    /// - [`ZipperError::Metadata`] if `metadata` cannot be encoded
    ///
    /// All of these are detected before anything is written.
    pub fn add_file_as<P: AsRef<Path>>(
        &mut self,
        source: P,
        name: &str,
        metadata: Option<&Value>,
    ) -> Result<()> {
        self.require_write("add file")?;
        let source = source.as_ref();

        let stat = std::fs::metadata(source).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ZipperError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                ZipperError::Io(e)
            }
        })?;
        if !stat.is_file() {
            return Err(ZipperError::InvalidSource {
                path: source.to_path_buf(),
                reason: "not a regular file".into(),
            });
        }
        self.check_unique(name)?;
        let comment = codec::encode_optional(metadata)?;

        let modified = stat
            .modified()
            .map(DosDateTime::from_system_time)
            .unwrap_or_default();
        let entry = NewEntry::new(name)
            .with_modified(modified)
            .with_size_hint(stat.len())
            .with_comment(comment);
        #[cfg(unix)]
        let entry = {
            use std::os::unix::fs::PermissionsExt;
            entry.with_unix_mode(stat.permissions().mode())
        };

        let mut file = File::open(source)?;
        self.write_entry("add file", entry, &mut file)?;
        debug!(source = %source.display(), name, bytes = stat.len(), "added file");
        Ok(())
    }

    /// Adds an entry from memory.
    ///
    /// # Errors
    ///
    /// Same as [`add_file_as`](Self::add_file_as), minus the source checks.
    pub fn add_bytes(&mut self, name: &str, data: &[u8], metadata: Option<&Value>) -> Result<()> {
        self.require_write("add bytes")?;
        self.check_unique(name)?;
        let comment = codec::encode_optional(metadata)?;

        let entry = NewEntry::new(name)
            .with_unix_mode(0o100_644)
            .with_size_hint(data.len() as u64)
            .with_comment(comment);
        self.write_entry("add bytes", entry, &mut &data[..])?;
        debug!(name, bytes = data.len(), "added in-memory entry");
        Ok(())
    }

    /// Sets archive-level metadata, written when the session closes.
    ///
    /// The value is encoded immediately; calling this again replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`ZipperError::InvalidState`] unless open for writing, and
    /// codec errors if the value cannot be encoded.
    pub fn set_archive_metadata<T: Serialize + ?Sized>(&mut self, metadata: &T) -> Result<()> {
        let writer = self.writer_mut("set archive metadata")?;
        let comment = codec::encode(metadata)?;
        writer.set_comment(comment)
    }

    /// Removes pending archive-level metadata.
    pub fn clear_archive_metadata(&mut self) -> Result<()> {
        self.writer_mut("clear archive metadata")?
            .set_comment(Vec::new())
    }

    /// Returns the archive-level metadata, or `None` if there is none.
    ///
    /// In write mode this is the pending value.
    pub fn get_archive_metadata(&self) -> Result<Option<Value>> {
        match &self.inner {
            Inner::Write(writer) => Ok(codec::decode(writer.comment())?),
            Inner::Read { directory, .. } => {
                self.decode_cached(MetadataTarget::Archive, &directory.comment)
            }
            Inner::Closed => Err(self.invalid_state("get archive metadata")),
        }
    }

    /// Returns the metadata of entry `name`, or `None` if it has none.
    ///
    /// # Errors
    ///
    /// Returns [`ZipperError::EntryNotFound`] if there is no such entry and
    /// codec errors if its comment is not UTF-8 JSON.
    pub fn get_file_metadata(&self, name: &str) -> Result<Option<Value>> {
        let record = self.find_record("get file metadata", name)?;
        match &self.inner {
            Inner::Read { .. } => self.decode_cached(MetadataTarget::entry(name), &record.comment),
            _ => Ok(codec::decode(&record.comment)?),
        }
    }

    /// Lists entries in stored order.
    ///
    /// Never fails on a bad comment; see [`EntryInfo::metadata`].
    pub fn list_contents(&self) -> Result<Vec<EntryInfo>> {
        self.require_open("list contents")?;
        Ok(self
            .inner
            .records()
            .iter()
            .cloned()
            .map(EntryInfo::new)
            .collect())
    }

    /// Returns `true` if an entry called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.inner.records().iter().any(|r| r.name == name)
    }

    /// Number of entries (zero once closed).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.records().len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads and decompresses entry `name` into memory.
    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.read_file_to(name, &mut data)?;
        Ok(data)
    }

    /// Streams entry `name` into `out`, verifying its CRC-32.
    ///
    /// # Errors
    ///
    /// Returns [`ZipperError::InvalidState`] unless open for reading,
    /// [`ZipperError::EntryNotFound`], [`ZipperError::UnsupportedCompression`]
    /// and [`ZipperError::CorruptArchive`] on a CRC or size mismatch.
    pub fn read_file_to<W: Write>(&mut self, name: &str, out: &mut W) -> Result<u64> {
        let state = self.state();
        let Inner::Read { file, directory } = &mut self.inner else {
            return Err(ZipperError::InvalidState {
                operation: "read file",
                state,
            });
        };
        let record = directory
            .find(name)
            .cloned()
            .ok_or_else(|| ZipperError::EntryNotFound {
                name: name.to_string(),
            })?;

        let mut buffer = CopyBuffer::new();
        let mut reader = CrcReader::new(open_entry(file, &record)?);
        let copied = copy_with_buffer(&mut reader, out, &mut buffer, self.cancel.as_ref())?;

        if copied != record.uncompressed_size || reader.crc32() != record.crc32 {
            return Err(ZipperError::corrupt(format!(
                "checksum mismatch for entry '{name}': expected {} bytes with CRC {:08x}, got {copied} bytes with CRC {:08x}",
                record.uncompressed_size,
                record.crc32,
                reader.crc32()
            )));
        }
        Ok(copied)
    }

    /// Finalizes the archive and releases the file.
    ///
    /// For write sessions this writes the central directory and end record
    /// (with the pending archive comment), flushes and syncs the file, and
    /// invalidates cached metadata for the path. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.inner, Inner::Closed) {
            Inner::Write(writer) => {
                let entries = writer.records().len();
                let file = writer
                    .finish()?
                    .into_inner()
                    .map_err(|e| ZipperError::Io(e.into_error()))?;
                file.sync_all()?;
                self.config.cache.invalidate_archive(&self.path);
                info!(path = %self.path.display(), entries, "archive finalized");
            }
            Inner::Read { .. } => {
                debug!(path = %self.path.display(), "closed archive");
            }
            Inner::Closed => {}
        }
        Ok(())
    }

    fn write_entry<R: std::io::Read>(
        &mut self,
        operation: &'static str,
        entry: NewEntry,
        reader: &mut R,
    ) -> Result<()> {
        let name = entry.name().to_string();
        let cancel = self.cancel.clone();
        self.writer_mut(operation)?
            .add_entry(entry, reader, cancel.as_ref())?;
        self.names.insert(name);
        Ok(())
    }

    fn check_unique(&self, name: &str) -> Result<()> {
        if self.names.contains(name) {
            return Err(ZipperError::DuplicateEntry {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn find_record(&self, operation: &'static str, name: &str) -> Result<&CentralRecord> {
        self.require_open(operation)?;
        self.inner
            .records()
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ZipperError::EntryNotFound {
                name: name.to_string(),
            })
    }

    fn decode_cached(&self, target: MetadataTarget, comment: &[u8]) -> Result<Option<Value>> {
        let key = CacheKey::new(&self.path, self.cache_generation, target);
        if let Some(hit) = self.config.cache.get(&key) {
            return Ok(hit);
        }
        let value = codec::decode(comment)?;
        self.config.cache.insert(key, value.clone());
        Ok(value)
    }

    fn writer_mut(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut ArchiveWriter<BufWriter<File>>> {
        let state = self.state();
        match &mut self.inner {
            Inner::Write(writer) => Ok(writer),
            _ => Err(ZipperError::InvalidState { operation, state }),
        }
    }

    fn require_write(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            SessionState::OpenWrite => Ok(()),
            _ => Err(self.invalid_state(operation)),
        }
    }

    fn require_open(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            SessionState::Closed => Err(self.invalid_state(operation)),
            _ => Ok(()),
        }
    }

    const fn invalid_state(&self, operation: &'static str) -> ZipperError {
        ZipperError::InvalidState {
            operation,
            state: self.state(),
        }
    }
}

impl Drop for ArchiveSession {
    fn drop(&mut self) {
        if matches!(self.inner, Inner::Write(_))
            && let Err(e) = self.close()
        {
            warn!(path = %self.path.display(), error = %e, "failed to finalize archive on drop");
        }
    }
}

fn create_archive_file(path: &Path, policy: OverwritePolicy) -> Result<File> {
    match policy {
        OverwritePolicy::Reject => OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    ZipperError::AlreadyExists {
                        path: path.to_path_buf(),
                    }
                } else {
                    ZipperError::Io(e)
                }
            }),
        OverwritePolicy::Truncate => Ok(File::create(path)?),
    }
}
