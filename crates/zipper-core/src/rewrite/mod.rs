//! Metadata changes on finalized archives.
//!
//! The rewriter copies every entry into a staged file in the same directory
//! and renames it over the original once it is complete and synced.

mod atomic;
mod rewriter;

pub use atomic::StagedFile;
pub use rewriter::MetadataRewriter;
