//! Error conversion utilities for CLI.
//!
//! Converts zipper-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use std::path::Path;
use zipper_core::MetadataError;
use zipper_core::ZipperError;

/// Converts `ZipperError` to user-friendly anyhow error with context
pub fn convert_zipper_error(err: ZipperError, archive: &Path) -> anyhow::Error {
    match err {
        ZipperError::NotFound { path } => {
            anyhow!(
                "Archive not found: {}\n\
                 HINT: Check the path, or create the archive with 'zipper create'.",
                path.display()
            )
        }
        ZipperError::AlreadyExists { path } => {
            anyhow!(
                "Archive '{}' already exists\n\
                 HINT: Use --force to overwrite it.",
                path.display()
            )
        }
        ZipperError::EntryNotFound { name } => {
            anyhow!(
                "File not found in archive '{}': {}\n\
                 HINT: Run 'zipper list-contents {}' to see the stored names.",
                archive.display(),
                name,
                archive.display()
            )
        }
        ZipperError::CorruptArchive(reason) => {
            anyhow!(
                "Invalid archive '{}': {}\n\
                 HINT: The archive may be truncated or not a ZIP file.",
                archive.display(),
                reason
            )
        }
        ZipperError::Metadata(MetadataError::TooLarge { size, max }) => {
            anyhow!(
                "Metadata is too large: {size} bytes encoded, but a ZIP comment holds at most {max}\n\
                 HINT: Store large metadata as a separate file inside the archive."
            )
        }
        ZipperError::Metadata(err @ (MetadataError::InvalidUtf8 { .. } | MetadataError::Malformed { .. })) => {
            anyhow!(
                "Stored comment in '{}' is not JSON metadata: {}\n\
                 HINT: The comment was written by another tool. Use 'zipper set-metadata' to replace it.",
                archive.display(),
                err
            )
        }
        ZipperError::Replace { path, source } => {
            anyhow!(
                "Could not replace '{}': {}\n\
                 HINT: Another process may be holding the archive open. The original is unchanged.",
                path.display(),
                source
            )
        }
        ZipperError::UnsupportedCompression(method) => {
            anyhow!(
                "Archive '{}' uses unsupported compression method {}\n\
                 HINT: Only stored and DEFLATE entries can be read.",
                archive.display(),
                method
            )
        }
        ZipperError::Io(io_err) => {
            anyhow!(
                "I/O error while processing '{}': {}",
                archive.display(),
                io_err
            )
        }
        _ => anyhow::Error::from(err)
            .context(format!("Error processing archive '{}'", archive.display())),
    }
}

/// Adds context to a generic error about archive operations
pub fn add_archive_context<T>(
    result: Result<T, ZipperError>,
    archive: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_zipper_error(e, archive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_convert_already_exists_error() {
        let err = ZipperError::AlreadyExists {
            path: PathBuf::from("out.zip"),
        };
        let converted = convert_zipper_error(err, Path::new("out.zip"));
        let msg = format!("{converted:?}");
        assert!(msg.contains("already exists"));
        assert!(msg.contains("--force"));
    }

    #[test]
    fn test_convert_entry_not_found_error() {
        let err = ZipperError::EntryNotFound {
            name: "missing.txt".into(),
        };
        let converted = convert_zipper_error(err, Path::new("bundle.zip"));
        let msg = format!("{converted:?}");
        assert!(msg.contains("File not found in archive"));
        assert!(msg.contains("missing.txt"));
        assert!(msg.contains("HINT"));
    }

    #[test]
    fn test_convert_too_large_error() {
        let err = ZipperError::Metadata(MetadataError::TooLarge {
            size: 70_000,
            max: 65_535,
        });
        let msg = format!("{:?}", convert_zipper_error(err, Path::new("a.zip")));
        assert!(msg.contains("70000"));
        assert!(msg.contains("65535"));
    }

    #[test]
    fn test_convert_malformed_comment_error() {
        let err = ZipperError::Metadata(MetadataError::InvalidUtf8 { valid_up_to: 0 });
        let msg = format!("{:?}", convert_zipper_error(err, Path::new("legacy.zip")));
        assert!(msg.contains("not JSON metadata"));
        assert!(msg.contains("set-metadata"));
    }

    #[test]
    fn test_convert_io_error() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let converted = convert_zipper_error(ZipperError::Io(io_err), Path::new("a.zip"));
        let msg = format!("{converted:?}");
        assert!(msg.contains("I/O error"));
    }

    #[test]
    fn test_other_errors_keep_context() {
        let converted = convert_zipper_error(ZipperError::Cancelled, Path::new("a.zip"));
        let msg = format!("{converted:?}");
        assert!(msg.contains("Error processing archive 'a.zip'"));
        assert!(msg.contains("operation cancelled"));
    }
}
