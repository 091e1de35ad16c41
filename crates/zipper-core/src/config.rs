//! Configuration for archive sessions and metadata rewrites.

use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::ZipperError;
use crate::metadata::MetadataCache;
use crate::metadata::NoopCache;

/// What to do when a write session targets an existing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Fail with [`ZipperError::AlreadyExists`].
    #[default]
    Reject,
    /// Truncate and replace the existing file.
    Truncate,
}

/// Configuration shared by [`ArchiveSession`](crate::ArchiveSession) and
/// [`MetadataRewriter`](crate::MetadataRewriter).
///
/// # Examples
///
/// ```
/// use zipper_core::OverwritePolicy;
/// use zipper_core::ZipperConfig;
///
/// // Secure defaults: never clobber an existing archive
/// let config = ZipperConfig::default();
/// assert_eq!(config.overwrite, OverwritePolicy::Reject);
///
/// let custom = ZipperConfig::default()
///     .with_overwrite(OverwritePolicy::Truncate)
///     .with_compression_level(9);
/// assert_eq!(custom.compression_level, Some(9));
/// ```
#[derive(Debug, Clone)]
pub struct ZipperConfig {
    /// Behavior when opening an existing path for writing.
    ///
    /// Default: [`OverwritePolicy::Reject`].
    pub overwrite: OverwritePolicy,

    /// DEFLATE level for new entries (0-9).
    ///
    /// `Some(0)` stores entries uncompressed; `None` uses the DEFLATE
    /// default.
    ///
    /// Default: `Some(6)`.
    pub compression_level: Option<u8>,

    /// How many times a transient rename failure is retried when the
    /// rewriter replaces the original archive.
    ///
    /// Default: `3`.
    pub replace_attempts: u32,

    /// Base delay between rename retries; attempt `n` waits `n * backoff`.
    ///
    /// Default: 50 ms.
    pub replace_backoff: Duration,

    /// Cache for decoded metadata.
    ///
    /// Default: [`NoopCache`].
    pub cache: Arc<dyn MetadataCache>,
}

impl Default for ZipperConfig {
    fn default() -> Self {
        Self {
            overwrite: OverwritePolicy::default(),
            compression_level: Some(6),
            replace_attempts: 3,
            replace_backoff: Duration::from_millis(50),
            cache: Arc::new(NoopCache),
        }
    }
}

impl ZipperConfig {
    /// Creates a new `ZipperConfig` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the overwrite policy.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Sets the compression level.
    ///
    /// # Panics
    ///
    /// Panics if the level is greater than 9. Use `validate()` for
    /// non-panicking validation.
    #[must_use]
    pub fn with_compression_level(mut self, level: u8) -> Self {
        assert!(level <= 9, "compression level must be 0-9");
        self.compression_level = Some(level);
        self
    }

    /// Sets the number of rename retries.
    #[must_use]
    pub fn with_replace_attempts(mut self, attempts: u32) -> Self {
        self.replace_attempts = attempts;
        self
    }

    /// Sets the base delay between rename retries.
    #[must_use]
    pub fn with_replace_backoff(mut self, backoff: Duration) -> Self {
        self.replace_backoff = backoff;
        self
    }

    /// Sets the metadata cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn MetadataCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ZipperError::InvalidCompressionLevel`] if the compression
    /// level is above 9.
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = self.compression_level
            && level > 9
        {
            return Err(ZipperError::InvalidCompressionLevel { level });
        }
        Ok(())
    }
}
