//! Read-through cache for decoded metadata.
//!
//! The cache is an injected collaborator: sessions and the rewriter receive
//! it through [`ZipperConfig::cache`](crate::ZipperConfig). The default is
//! [`NoopCache`], which never stores anything.
//!
//! Invalidation rule: every operation that changes an archive file (closing
//! a write session, a successful rewrite) calls
//! [`MetadataCache::invalidate_archive`] for that path before the new file
//! becomes visible.
//!
//! Invalidation also advances the path's generation. Sessions capture the
//! generation before reading the central directory and put it into every
//! key they use, so a session opened before a rewrite can never store its
//! older values where later sessions would find them.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::path::PathBuf;

use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;

use super::MetadataTarget;

/// Cache key: canonical archive path, archive generation and comment field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    archive: PathBuf,
    generation: u64,
    target: MetadataTarget,
}

impl CacheKey {
    /// Creates a key, canonicalizing the archive path when it exists.
    ///
    /// `generation` is the value [`MetadataCache::generation`] returned
    /// before the archive contents were read.
    pub fn new(archive: &Path, generation: u64, target: MetadataTarget) -> Self {
        Self {
            archive: canonical_archive_path(archive),
            generation,
            target,
        }
    }

    /// Returns the archive path of this key.
    #[must_use]
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Returns the archive generation of this key.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the comment field of this key.
    #[must_use]
    pub const fn target(&self) -> &MetadataTarget {
        &self.target
    }
}

/// Resolves the path under which cache entries are stored.
pub(crate) fn canonical_archive_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Storage for decoded metadata values.
///
/// A cached `None` records that the comment field is empty.
pub trait MetadataCache: fmt::Debug + Send + Sync {
    /// Current generation of `archive`.
    ///
    /// Must change on every [`invalidate_archive`](Self::invalidate_archive)
    /// for that path.
    fn generation(&self, archive: &Path) -> u64;

    /// Looks up a decoded value.
    fn get(&self, key: &CacheKey) -> Option<Option<Value>>;

    /// Stores a decoded value.
    ///
    /// Values whose key carries an outdated generation are discarded.
    fn insert(&self, key: CacheKey, value: Option<Value>);

    /// Drops every entry belonging to `archive` and advances its generation.
    fn invalidate_archive(&self, archive: &Path);
}

/// Cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl MetadataCache for NoopCache {
    fn generation(&self, _archive: &Path) -> u64 {
        0
    }

    fn get(&self, _key: &CacheKey) -> Option<Option<Value>> {
        None
    }

    fn insert(&self, _key: CacheKey, _value: Option<Value>) {}

    fn invalidate_archive(&self, _archive: &Path) {}
}

/// Bounded least-recently-used cache shared across sessions.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
/// use std::sync::Arc;
/// use zipper_core::ZipperConfig;
/// use zipper_core::metadata::LruMetadataCache;
///
/// let capacity = NonZeroUsize::new(256).unwrap();
/// let config = ZipperConfig::default().with_cache(Arc::new(LruMetadataCache::new(capacity)));
/// ```
pub struct LruMetadataCache {
    state: Mutex<LruState>,
}

struct LruState {
    entries: LruCache<CacheKey, Option<Value>>,
    generations: HashMap<PathBuf, u64>,
}

impl LruState {
    fn generation(&self, archive: &Path) -> u64 {
        self.generations.get(archive).copied().unwrap_or(0)
    }
}

impl LruMetadataCache {
    /// Creates a cache holding at most `capacity` values.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            state: Mutex::new(LruState {
                entries: LruCache::new(capacity),
                generations: HashMap::new(),
            }),
        }
    }

    /// Returns the number of cached values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

impl fmt::Debug for LruMetadataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LruMetadataCache")
            .field("len", &state.entries.len())
            .field("capacity", &state.entries.cap())
            .finish()
    }
}

impl MetadataCache for LruMetadataCache {
    fn generation(&self, archive: &Path) -> u64 {
        let archive = canonical_archive_path(archive);
        self.state.lock().generation(&archive)
    }

    fn get(&self, key: &CacheKey) -> Option<Option<Value>> {
        self.state.lock().entries.get(key).cloned()
    }

    fn insert(&self, key: CacheKey, value: Option<Value>) {
        let mut state = self.state.lock();
        if key.generation != state.generation(&key.archive) {
            return;
        }
        state.entries.put(key, value);
    }

    fn invalidate_archive(&self, archive: &Path) {
        let archive = canonical_archive_path(archive);
        let mut state = self.state.lock();
        let stale: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(key, _)| key.archive == archive)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            state.entries.pop(key);
        }
        *state.generations.entry(archive).or_insert(0) += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(capacity: usize) -> LruMetadataCache {
        LruMetadataCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_noop_cache_never_hits() {
        let cache = NoopCache;
        let key = CacheKey::new(Path::new("a.zip"), 0, MetadataTarget::Archive);
        cache.insert(key.clone(), Some(json!({"a": 1})));
        assert_eq!(cache.get(&key), None);
    }

    #[test]
    fn test_lru_cache_hit_and_empty_marker() {
        let cache = cache(4);
        let key = CacheKey::new(Path::new("a.zip"), 0, MetadataTarget::entry("x.txt"));
        assert_eq!(cache.get(&key), None);

        cache.insert(key.clone(), None);
        assert_eq!(cache.get(&key), Some(None));

        cache.insert(key.clone(), Some(json!({"v": 2})));
        assert_eq!(cache.get(&key), Some(Some(json!({"v": 2}))));
    }

    #[test]
    fn test_lru_cache_invalidate_archive_only_drops_that_path() {
        let cache = cache(8);
        let a1 = CacheKey::new(Path::new("a.zip"), 0, MetadataTarget::Archive);
        let a2 = CacheKey::new(Path::new("a.zip"), 0, MetadataTarget::entry("f"));
        let b1 = CacheKey::new(Path::new("b.zip"), 0, MetadataTarget::Archive);
        cache.insert(a1.clone(), None);
        cache.insert(a2.clone(), None);
        cache.insert(b1.clone(), None);

        cache.invalidate_archive(Path::new("a.zip"));

        assert_eq!(cache.get(&a1), None);
        assert_eq!(cache.get(&a2), None);
        assert_eq!(cache.get(&b1), Some(None));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_lru_cache_invalidate_advances_generation() {
        let cache = cache(8);
        let archive = Path::new("a.zip");
        assert_eq!(cache.generation(archive), 0);
        cache.invalidate_archive(archive);
        assert_eq!(cache.generation(archive), 1);
        assert_eq!(cache.generation(Path::new("b.zip")), 0);
    }

    #[test]
    fn test_lru_cache_discards_outdated_generation() {
        let cache = cache(8);
        let archive = Path::new("a.zip");
        let before = CacheKey::new(archive, cache.generation(archive), MetadataTarget::Archive);
        cache.invalidate_archive(archive);

        cache.insert(before.clone(), Some(json!({"v": 1})));
        assert!(cache.is_empty());
        assert_eq!(cache.get(&before), None);

        let current = CacheKey::new(archive, cache.generation(archive), MetadataTarget::Archive);
        assert_ne!(current, before);
        cache.insert(current.clone(), Some(json!({"v": 2})));
        assert_eq!(cache.get(&current), Some(Some(json!({"v": 2}))));
    }

    #[test]
    fn test_lru_cache_evicts_oldest() {
        let cache = cache(1);
        let first = CacheKey::new(Path::new("a.zip"), 0, MetadataTarget::Archive);
        let second = CacheKey::new(Path::new("b.zip"), 0, MetadataTarget::Archive);
        cache.insert(first.clone(), None);
        cache.insert(second.clone(), None);
        assert_eq!(cache.get(&first), None);
        assert_eq!(cache.get(&second), Some(None));
    }
}
