//! JSON output formatter for machine-readable results.

use super::formatter::CreationSummary;
use super::formatter::EntryRow;
use super::formatter::JsonOutput;
use super::formatter::MetadataView;
use super::formatter::OutputFormatter;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::io::{self};
use std::path::Path;
use zipper_core::RewriteReport;

pub struct JsonFormatter;

impl JsonFormatter {
    fn output<T: Serialize>(value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        writeln!(io::stdout(), "{json}")?;
        Ok(())
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_creation_result(&self, archive: &Path, summary: &CreationSummary) -> Result<()> {
        #[derive(Serialize)]
        struct CreationOutput<'a> {
            archive: String,
            #[serde(flatten)]
            summary: &'a CreationSummary,
            duration_ms: u128,
        }

        let data = CreationOutput {
            archive: archive.display().to_string(),
            summary,
            duration_ms: summary.duration.as_millis(),
        };
        Self::output(&JsonOutput::success("create", data))
    }

    fn format_metadata(&self, view: &MetadataView) -> Result<()> {
        Self::output(&JsonOutput::success("get-metadata", view))
    }

    fn format_listing(
        &self,
        archive: &Path,
        archive_metadata: Option<&Value>,
        entries: &[EntryRow],
        _human_readable: bool,
    ) -> Result<()> {
        #[derive(Serialize)]
        struct ListingOutput<'a> {
            archive: String,
            metadata: Option<&'a Value>,
            total_entries: usize,
            total_size: u64,
            entries: &'a [EntryRow],
        }

        let data = ListingOutput {
            archive: archive.display().to_string(),
            metadata: archive_metadata,
            total_entries: entries.len(),
            total_size: entries.iter().map(|e| e.size).sum(),
            entries,
        };
        Self::output(&JsonOutput::success("list-contents", data))
    }

    fn format_rewrite_result(&self, archive: &Path, report: &RewriteReport) -> Result<()> {
        #[derive(Serialize)]
        struct RewriteOutput {
            archive: String,
            target: String,
            changed: bool,
            entries_copied: usize,
            bytes_copied: u64,
            archive_size: u64,
            duration_ms: u128,
        }

        let data = RewriteOutput {
            archive: archive.display().to_string(),
            target: report.target.to_string(),
            changed: report.changed,
            entries_copied: report.entries_copied,
            bytes_copied: report.bytes_copied,
            archive_size: report.archive_size,
            duration_ms: report.duration.as_millis(),
        };
        Self::output(&JsonOutput::success("set-metadata", data))
    }

    fn format_warning(&self, message: &str) {
        #[derive(Serialize)]
        struct WarningData<'a> {
            message: &'a str,
        }

        // Warnings go to stderr so stdout stays a single JSON document.
        let output = JsonOutput::success("warning", WarningData { message });
        if let Ok(json) = serde_json::to_string(&output) {
            let _ = writeln!(io::stderr(), "{json}");
        }
    }
}
