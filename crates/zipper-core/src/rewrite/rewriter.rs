//! Read-rewrite-replace of comment fields.

use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use tracing::debug;
use tracing::info;

use crate::CancellationToken;
use crate::Result;
use crate::RewriteReport;
use crate::ZipperConfig;
use crate::ZipperError;
use crate::format::ArchiveWriter;
use crate::format::read_central_directory;
use crate::metadata::MetadataTarget;
use crate::metadata::MetadataUpdate;
use crate::metadata::codec;

use super::StagedFile;

/// Changes one comment field of a finalized archive.
///
/// Entries are copied byte for byte (headers, compressed data, data
/// descriptors), so no entry is recompressed and every comment other than
/// the target keeps its exact bytes. The new archive is built in a staged
/// file and renamed over the original; on any failure the original is left
/// untouched and the staged file is removed.
///
/// A symlinked archive path is resolved first: the file it points to is
/// replaced and the link itself stays in place.
///
/// # Examples
///
/// ```no_run
/// use serde_json::json;
/// use zipper_core::{MetadataRewriter, MetadataTarget, MetadataUpdate};
///
/// let report = MetadataRewriter::new("bundle.zip").rewrite(
///     &MetadataTarget::entry("doc.txt"),
///     &MetadataUpdate::Set(json!({"type": "text", "reviewed": true})),
/// )?;
/// println!("copied {} entries", report.entries_copied);
/// # Ok::<(), zipper_core::ZipperError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MetadataRewriter {
    path: PathBuf,
    config: ZipperConfig,
    cancel: Option<CancellationToken>,
}

impl MetadataRewriter {
    /// Creates a rewriter for the archive at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config: ZipperConfig::default(),
            cancel: None,
        }
    }

    /// Sets the configuration (cache, rename retries).
    #[must_use]
    pub fn config(mut self, config: ZipperConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets a token checked between copied chunks.
    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Archive this rewriter operates on.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `update` to the comment selected by `target`.
    ///
    /// # Errors
    ///
    /// - [`ZipperError::NotFound`] if the archive does not exist
    /// - [`ZipperError::CorruptArchive`] if it cannot be parsed
    /// - [`ZipperError::EntryNotFound`] if the target entry is missing
    /// - [`ZipperError::Metadata`] if the new value cannot be encoded, or
    ///   a merge finds an existing comment that is not JSON
    /// - [`ZipperError::Cancelled`] if the token fires
    /// - [`ZipperError::Replace`] if the final rename fails
    ///
    /// Every failure leaves the original archive byte-identical.
    pub fn rewrite(&self, target: &MetadataTarget, update: &MetadataUpdate) -> Result<RewriteReport> {
        let start = Instant::now();
        self.config.validate()?;
        let cancel = self.cancel.as_ref();

        let file = File::open(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ZipperError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                ZipperError::Io(e)
            }
        })?;
        let destination = std::fs::canonicalize(&self.path)?;
        let permissions = file.metadata()?.permissions();
        let mut source = BufReader::new(file);
        let directory = read_central_directory(&mut source)?;

        let target_index = match target {
            MetadataTarget::Archive => None,
            MetadataTarget::Entry(name) => Some(directory.position(name).ok_or_else(|| {
                ZipperError::EntryNotFound { name: name.clone() }
            })?),
        };
        let current_comment = target_index.map_or(&directory.comment, |i| &directory.records[i].comment);

        let current = if update.needs_current() {
            codec::decode(current_comment)?
        } else {
            None
        };
        let new_comment = codec::encode_optional(update.apply(current).as_ref())?;
        let changed = new_comment != *current_comment;
        debug!(
            path = %self.path.display(),
            destination = %destination.display(),
            %target,
            entries = directory.records.len(),
            comment_bytes = new_comment.len(),
            changed,
            "rewriting archive metadata"
        );

        let mut report = RewriteReport::new(target.clone());
        report.changed = changed;

        let mut staged = StagedFile::create(&destination)?;
        {
            let mut writer = ArchiveWriter::new(
                BufWriter::new(staged.as_file_mut()),
                self.config.compression_level,
            );
            for (index, record) in directory.records.iter().enumerate() {
                let comment = if target_index == Some(index) {
                    new_comment.clone()
                } else {
                    record.comment.clone()
                };
                report.bytes_copied += writer.copy_raw_entry(&mut source, record, comment, cancel)?;
                report.entries_copied += 1;
            }

            let archive_comment = if target_index.is_none() {
                new_comment
            } else {
                directory.comment
            };
            writer.set_comment(archive_comment)?;

            let file = writer
                .finish()?
                .into_inner()
                .map_err(|e| ZipperError::Io(e.into_error()))?;
            file.set_permissions(permissions)?;
            file.sync_all()?;
        }
        report.archive_size = staged.as_file().metadata()?.len();
        drop(source);

        if let Some(token) = cancel {
            token.check()?;
        }

        self.config.cache.invalidate_archive(&self.path);
        staged.commit(self.config.replace_attempts, self.config.replace_backoff)?;
        self.config.cache.invalidate_archive(&self.path);

        report.duration = start.elapsed();
        info!(
            path = %self.path.display(),
            %target,
            entries = report.entries_copied,
            bytes = report.archive_size,
            duration_ms = report.duration.as_millis(),
            "archive metadata rewritten"
        );
        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ArchiveSession;
    use crate::OpenMode;
    use serde_json::Map;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("sample.zip");
        let mut session = ArchiveSession::open(&path, OpenMode::Write).unwrap();
        session
            .add_bytes("doc.txt", b"document", Some(&json!({"type": "text"})))
            .unwrap();
        session.add_bytes("img.png", b"\x89PNG", None).unwrap();
        session
            .set_archive_metadata(&json!({"project": "demo"}))
            .unwrap();
        session.close().unwrap();
        path
    }

    fn read(path: &Path) -> ArchiveSession {
        ArchiveSession::open(path, OpenMode::Read).unwrap()
    }

    #[test]
    fn test_set_entry_metadata() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir);

        let report = MetadataRewriter::new(&path)
            .rewrite(
                &MetadataTarget::entry("img.png"),
                &MetadataUpdate::Set(json!({"w": 10})),
            )
            .unwrap();
        assert!(report.changed);
        assert_eq!(report.entries_copied, 2);
        assert_eq!(report.archive_size, std::fs::metadata(&path).unwrap().len());

        let session = read(&path);
        assert_eq!(session.get_file_metadata("img.png").unwrap(), Some(json!({"w": 10})));
        assert_eq!(session.get_file_metadata("doc.txt").unwrap(), Some(json!({"type": "text"})));
        assert_eq!(session.get_archive_metadata().unwrap(), Some(json!({"project": "demo"})));
    }

    #[test]
    fn test_merge_and_clear_archive_metadata() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir);
        let rewriter = MetadataRewriter::new(&path);

        let mut patch = Map::new();
        patch.insert("version".into(), json!(2));
        rewriter
            .rewrite(&MetadataTarget::Archive, &MetadataUpdate::Merge(patch))
            .unwrap();
        assert_eq!(
            read(&path).get_archive_metadata().unwrap(),
            Some(json!({"project": "demo", "version": 2}))
        );

        rewriter
            .rewrite(&MetadataTarget::Archive, &MetadataUpdate::Clear)
            .unwrap();
        assert_eq!(read(&path).get_archive_metadata().unwrap(), None);
    }

    #[test]
    fn test_unchanged_value_reports_no_change() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir);
        let report = MetadataRewriter::new(&path)
            .rewrite(
                &MetadataTarget::entry("doc.txt"),
                &MetadataUpdate::Set(json!({"type": "text"})),
            )
            .unwrap();
        assert!(!report.changed);
    }

    #[test]
    fn test_errors_leave_original_untouched() {
        let dir = TempDir::new().unwrap();
        let path = sample(&dir);
        let before = std::fs::read(&path).unwrap();
        let rewriter = MetadataRewriter::new(&path);

        let err = rewriter
            .rewrite(&MetadataTarget::entry("missing.txt"), &MetadataUpdate::Clear)
            .unwrap_err();
        assert!(matches!(err, ZipperError::EntryNotFound { .. }));

        let huge = json!("x".repeat(70_000));
        let err = rewriter
            .rewrite(&MetadataTarget::Archive, &MetadataUpdate::Set(huge))
            .unwrap_err();
        assert!(err.is_encoding_error());

        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_archive() {
        let dir = TempDir::new().unwrap();
        let err = MetadataRewriter::new(dir.path().join("none.zip"))
            .rewrite(&MetadataTarget::Archive, &MetadataUpdate::Clear)
            .unwrap_err();
        assert!(matches!(err, ZipperError::NotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = sample(&dir);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        MetadataRewriter::new(&path)
            .rewrite(&MetadataTarget::Archive, &MetadataUpdate::Clear)
            .unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_archive_updates_link_target() {
        let dir = TempDir::new().unwrap();
        let real = sample(&dir);
        let links = TempDir::new().unwrap();
        let link = links.path().join("current.zip");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        MetadataRewriter::new(&link)
            .rewrite(
                &MetadataTarget::Archive,
                &MetadataUpdate::Set(json!({"project": "linked"})),
            )
            .unwrap();

        assert!(std::fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_link(&link).unwrap(), real);
        assert_eq!(
            read(&real).get_archive_metadata().unwrap(),
            Some(json!({"project": "linked"}))
        );
        assert_eq!(
            read(&link).get_archive_metadata().unwrap(),
            Some(json!({"project": "linked"}))
        );
        // staged file lived and died next to the real archive
        assert_eq!(std::fs::read_dir(links.path()).unwrap().count(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
