//! Output formatter trait for CLI results.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use zipper_core::EntryInfo;
use zipper_core::RewriteReport;

/// Common output formatter trait
pub trait OutputFormatter {
    /// Format the result of `create`
    fn format_creation_result(&self, archive: &Path, summary: &CreationSummary) -> Result<()>;

    /// Format the result of `get-metadata`
    fn format_metadata(&self, view: &MetadataView) -> Result<()>;

    /// Format the result of `list-contents`
    fn format_listing(
        &self,
        archive: &Path,
        archive_metadata: Option<&Value>,
        entries: &[EntryRow],
        human_readable: bool,
    ) -> Result<()>;

    /// Format the result of `set-metadata`
    fn format_rewrite_result(&self, archive: &Path, report: &RewriteReport) -> Result<()>;

    /// Format warning message
    fn format_warning(&self, message: &str);
}

/// Outcome of a `create` run.
#[derive(Debug, Default, Serialize)]
pub struct CreationSummary {
    pub files_added: usize,
    pub files_with_metadata: usize,
    pub skipped: Vec<PathBuf>,
    pub archive_metadata: bool,
    pub archive_size: u64,
    #[serde(skip)]
    pub duration: Duration,
}

/// What `get-metadata` found.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MetadataView {
    /// Metadata of a single entry.
    File {
        file: String,
        metadata: Option<Value>,
    },
    /// Archive metadata plus every entry that carries metadata.
    Archive {
        archive: Option<Value>,
        files: Vec<EntryRow>,
    },
}

/// One row of an entry listing.
#[derive(Debug, Serialize)]
pub struct EntryRow {
    pub name: String,
    pub size: u64,
    pub compressed_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_error: Option<String>,
}

impl From<&EntryInfo> for EntryRow {
    fn from(entry: &EntryInfo) -> Self {
        let (metadata, metadata_error) = match entry.metadata() {
            Ok(value) => (value.cloned(), None),
            Err(err) => (None, Some(err.to_string())),
        };
        Self {
            name: entry.name().to_string(),
            size: entry.size(),
            compressed_size: entry.compressed_size(),
            modified: entry
                .modified()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            metadata,
            metadata_error,
        }
    }
}

impl EntryRow {
    /// Returns `true` if the entry has metadata, valid or not.
    pub const fn has_metadata(&self) -> bool {
        self.metadata.is_some() || self.metadata_error.is_some()
    }
}

/// Generic JSON output structure
#[derive(Debug, Serialize)]
pub struct JsonOutput<T> {
    pub operation: String,
    pub status: Status,
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(operation: impl Into<String>, data: T) -> Self {
        Self {
            operation: operation.into(),
            status: Status::Success,
            data,
        }
    }
}
