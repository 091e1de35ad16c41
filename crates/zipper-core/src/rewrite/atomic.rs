//! Same-directory staging file with atomic replace.

use std::fs::File;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;
use tempfile::PersistError;
use tracing::debug;
use tracing::warn;

use crate::Result;
use crate::ZipperError;

/// A temporary file next to `target` that replaces it on commit.
///
/// Dropping an uncommitted `StagedFile` deletes the temporary file, so every
/// early return between creation and commit cleans up after itself.
#[derive(Debug)]
pub struct StagedFile {
    target: PathBuf,
    temp: NamedTempFile,
}

impl StagedFile {
    /// Creates `.<name>.<random>.tmp` in the directory of `target`.
    pub fn create(target: &Path) -> Result<Self> {
        let dir = target
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = target
            .file_name()
            .map_or_else(|| "archive".into(), |name| name.to_string_lossy());

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".tmp")
            .tempfile_in(dir)?;
        debug!(
            target = %target.display(),
            temp = %temp.path().display(),
            "staged temporary archive"
        );

        Ok(Self {
            target: target.to_path_buf(),
            temp,
        })
    }

    /// Path of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Path that will be replaced.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The temporary file, for writing.
    pub fn as_file_mut(&mut self) -> &mut File {
        self.temp.as_file_mut()
    }

    /// The temporary file.
    #[must_use]
    pub fn as_file(&self) -> &File {
        self.temp.as_file()
    }

    /// Renames the temporary file over the target.
    ///
    /// Transient failures are retried up to `attempts` times, waiting
    /// `attempt * backoff` before each retry. On final failure the
    /// temporary file is removed and the target is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ZipperError::Replace`] if the rename does not succeed.
    pub fn commit(self, attempts: u32, backoff: Duration) -> Result<()> {
        let Self { target, mut temp } = self;
        let mut attempt = 0;

        loop {
            match temp.persist(&target) {
                Ok(_) => {
                    debug!(target = %target.display(), attempt, "replaced archive");
                    return Ok(());
                }
                Err(PersistError { error, file }) => {
                    if attempt < attempts && is_transient(&error) {
                        attempt += 1;
                        warn!(
                            target = %target.display(),
                            attempt,
                            error = %error,
                            "rename failed, retrying"
                        );
                        std::thread::sleep(backoff * attempt);
                        temp = file;
                        continue;
                    }

                    warn!(
                        target = %target.display(),
                        error = %error,
                        "rename failed, removing staged file"
                    );
                    drop(file);
                    return Err(ZipperError::Replace {
                        path: target,
                        source: error,
                    });
                }
            }
        }
    }
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::ResourceBusy
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
    )
}
