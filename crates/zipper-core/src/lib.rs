//! Structured JSON metadata for ZIP archives.
//!
//! `zipper-core` stores a JSON value in the archive comment and one in each
//! entry's central-directory comment. The files stay plain ZIP archives that
//! any tool can open. Comments of a finalized archive are changed by
//! rewriting it into a staged file and renaming that over the original, so
//! readers never observe a half-written archive.
//!
//! # Examples
//!
//! ```no_run
//! use serde_json::json;
//! use zipper_core::{MetadataTarget, MetadataUpdate, OpenMode};
//! use zipper_core::{open_archive, read_file_metadata, rewrite_metadata};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut zip = open_archive("bundle.zip", OpenMode::Write)?;
//! zip.add_file("doc.txt", Some(&json!({"type": "text"})))?;
//! zip.set_archive_metadata(&json!({"project": "demo"}))?;
//! zip.close()?;
//!
//! rewrite_metadata(
//!     "bundle.zip",
//!     &MetadataTarget::entry("doc.txt"),
//!     &MetadataUpdate::Set(json!({"type": "text", "reviewed": true})),
//! )?;
//! assert_eq!(
//!     read_file_metadata("bundle.zip", "doc.txt")?,
//!     Some(json!({"reviewed": true, "type": "text"}))
//! );
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod cancel;
pub mod config;
pub mod copy;
pub mod error;
pub mod format;
pub mod io;
pub mod metadata;
pub mod report;
pub mod rewrite;
pub mod session;

// Re-export main API types
pub use api::open_archive;
pub use api::read_archive_metadata;
pub use api::read_file_metadata;
pub use api::rewrite_metadata;
pub use cancel::CancellationToken;
pub use config::OverwritePolicy;
pub use config::ZipperConfig;
pub use error::MetadataError;
pub use error::Result;
pub use error::ZipperError;
pub use metadata::MetadataTarget;
pub use metadata::MetadataUpdate;
pub use report::RewriteReport;
pub use rewrite::MetadataRewriter;
pub use session::ArchiveSession;
pub use session::EntryInfo;
pub use session::OpenMode;
pub use session::SessionState;
