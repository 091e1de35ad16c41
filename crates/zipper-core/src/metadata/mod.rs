//! Metadata values stored in ZIP comment fields.
//!
//! The [`codec`] module converts JSON values to and from comment bytes; the
//! [`cache`] module provides an optional read-through cache of decoded
//! values keyed by archive path and [`MetadataTarget`].

pub mod cache;
pub mod codec;

use std::fmt;

use serde_json::Map;
use serde_json::Value;

pub use cache::CacheKey;
pub use cache::LruMetadataCache;
pub use cache::MetadataCache;
pub use cache::NoopCache;
pub use codec::MAX_COMMENT_LEN;

/// Which comment field a metadata operation addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetadataTarget {
    /// The end-of-central-directory comment.
    Archive,
    /// The central-directory comment of the named entry.
    Entry(String),
}

impl MetadataTarget {
    /// Creates an entry target.
    pub fn entry(name: impl Into<String>) -> Self {
        Self::Entry(name.into())
    }

    /// Returns the entry name for entry targets.
    #[must_use]
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Self::Archive => None,
            Self::Entry(name) => Some(name),
        }
    }
}

impl fmt::Display for MetadataTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive => write!(f, "archive"),
            Self::Entry(name) => write!(f, "entry '{name}'"),
        }
    }
}

/// New metadata for a rewrite.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataUpdate {
    /// Replace the stored value.
    Set(Value),
    /// Merge top-level keys into the stored object.
    Merge(Map<String, Value>),
    /// Remove the comment entirely.
    Clear,
}

impl MetadataUpdate {
    /// Computes the value to store given the currently stored one.
    ///
    /// `None` means the comment is removed.
    #[must_use]
    pub fn apply(&self, current: Option<Value>) -> Option<Value> {
        match self {
            Self::Set(value) => Some(value.clone()),
            Self::Merge(patch) => Some(codec::merge(current, patch)),
            Self::Clear => None,
        }
    }

    /// Returns `true` if applying needs the currently stored value.
    #[must_use]
    pub const fn needs_current(&self) -> bool {
        matches!(self, Self::Merge(_))
    }
}
