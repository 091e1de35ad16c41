//! High-level public API for metadata-bearing archives.

use std::path::Path;

use serde_json::Value;

use crate::ArchiveSession;
use crate::MetadataRewriter;
use crate::OpenMode;
use crate::Result;
use crate::RewriteReport;
use crate::metadata::MetadataTarget;
use crate::metadata::MetadataUpdate;

/// Opens an archive session with the default configuration.
///
/// # Errors
///
/// See [`ArchiveSession::open_with`].
///
/// # Examples
///
/// ```no_run
/// use zipper_core::{OpenMode, open_archive};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = open_archive("bundle.zip", OpenMode::Read)?;
/// for entry in session.list_contents()? {
///     println!("{} {}", entry.name(), entry.size());
/// }
/// session.close()?;
/// # Ok(())
/// # }
/// ```
pub fn open_archive<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<ArchiveSession> {
    ArchiveSession::open(path, mode)
}

/// Changes one comment of a finalized archive with default settings.
///
/// # Errors
///
/// See [`MetadataRewriter::rewrite`].
///
/// # Examples
///
/// ```no_run
/// use serde_json::json;
/// use zipper_core::{MetadataTarget, MetadataUpdate, rewrite_metadata};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// rewrite_metadata(
///     "bundle.zip",
///     &MetadataTarget::Archive,
///     &MetadataUpdate::Set(json!({"project": "demo", "version": 2})),
/// )?;
/// # Ok(())
/// # }
/// ```
pub fn rewrite_metadata<P: AsRef<Path>>(
    path: P,
    target: &MetadataTarget,
    update: &MetadataUpdate,
) -> Result<RewriteReport> {
    MetadataRewriter::new(path).rewrite(target, update)
}

/// Reads the archive-level metadata of `path`.
///
/// # Errors
///
/// Returns open errors and codec errors for the archive comment.
pub fn read_archive_metadata<P: AsRef<Path>>(path: P) -> Result<Option<Value>> {
    let mut session = ArchiveSession::open(path, OpenMode::Read)?;
    let value = session.get_archive_metadata()?;
    session.close()?;
    Ok(value)
}

/// Reads the metadata of entry `name` in `path`.
///
/// # Errors
///
/// Returns open errors, [`ZipperError::EntryNotFound`](crate::ZipperError::EntryNotFound)
/// and codec errors for the entry comment.
pub fn read_file_metadata<P: AsRef<Path>>(path: P, name: &str) -> Result<Option<Value>> {
    let mut session = ArchiveSession::open(path, OpenMode::Read)?;
    let value = session.get_file_metadata(name)?;
    session.close()?;
    Ok(value)
}
