//! Human-readable output formatter with colors and styling.

use super::formatter::CreationSummary;
use super::formatter::EntryRow;
use super::formatter::MetadataView;
use super::formatter::OutputFormatter;
use anyhow::Result;
use console::Term;
use console::style;
use serde_json::Value;
use std::path::Path;
use zipper_core::RewriteReport;

pub struct HumanFormatter {
    verbose: bool,
    quiet: bool,
    use_colors: bool,
    term: Term,
}

impl HumanFormatter {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            use_colors: console::colors_enabled(),
            term: Term::stdout(),
        }
    }

    fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.1} KB", bytes as f64 / KB as f64)
        } else {
            format!("{bytes} B")
        }
    }

    fn format_number(n: usize) -> String {
        let s = n.to_string();
        let mut result = String::new();
        for (i, c) in s.chars().rev().enumerate() {
            if i > 0 && i % 3 == 0 {
                result.push(',');
            }
            result.push(c);
        }
        result.chars().rev().collect()
    }

    /// Pretty JSON, indented by `indent` spaces on continuation lines.
    fn format_json(value: &Value, indent: usize) -> String {
        let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        pretty.replace('\n', &format!("\n{}", " ".repeat(indent)))
    }

    fn line(&self, text: &str) {
        let _ = self.term.write_line(text);
    }

    fn heading(&self, text: &str) {
        if self.use_colors {
            self.line(&format!("{}", style(text).blue().bold()));
        } else {
            self.line(text);
        }
    }

    fn check(&self, text: &str) {
        if self.use_colors {
            self.line(&format!("{} {text}", style("✓").green().bold()));
        } else {
            self.line(text);
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.use_colors {
            style(text).dim().to_string()
        } else {
            text.to_string()
        }
    }

    fn entry_metadata(&self, row: &EntryRow) -> String {
        match (&row.metadata, &row.metadata_error) {
            (Some(value), _) => value.to_string(),
            (None, Some(err)) => {
                let text = format!("<invalid: {err}>");
                if self.use_colors {
                    style(text).red().to_string()
                } else {
                    text
                }
            }
            (None, None) => self.dim("No metadata"),
        }
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_creation_result(&self, archive: &Path, summary: &CreationSummary) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        self.check(&format!("Archive created: {}", archive.display()));
        self.line("");
        self.line(&format!(
            "  Files added:      {}",
            Self::format_number(summary.files_added)
        ));
        self.line(&format!(
            "  With metadata:    {}",
            Self::format_number(summary.files_with_metadata)
        ));
        self.line(&format!(
            "  Archive metadata: {}",
            if summary.archive_metadata { "yes" } else { "no" }
        ));
        self.line(&format!(
            "  Archive size:     {}",
            Self::format_size(summary.archive_size)
        ));
        if !summary.skipped.is_empty() {
            self.line(&format!("  Files skipped:    {}", summary.skipped.len()));
        }
        if self.verbose {
            self.line(&format!("  Duration:         {:?}", summary.duration));
        }

        Ok(())
    }

    fn format_metadata(&self, view: &MetadataView) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        match view {
            MetadataView::File { file, metadata } => match metadata {
                Some(value) => {
                    self.heading(&format!("Metadata for {file}:"));
                    self.line(&Self::format_json(value, 0));
                }
                None => self.line(&format!("No metadata found for {file}")),
            },
            MetadataView::Archive { archive, files } => {
                if let Some(value) = archive {
                    self.heading("Archive Metadata:");
                    self.line(&Self::format_json(value, 0));
                    self.line("");
                }

                self.heading("File Metadata:");
                if files.is_empty() {
                    self.line(&self.dim("No file metadata found"));
                }
                for row in files {
                    self.line(&format!("  {}: {}", row.name, self.entry_metadata(row)));
                }
            }
        }

        Ok(())
    }

    fn format_listing(
        &self,
        archive: &Path,
        archive_metadata: Option<&Value>,
        entries: &[EntryRow],
        human_readable: bool,
    ) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        self.heading(&format!("Archive: {}", archive.display()));
        if let Some(value) = archive_metadata {
            self.line(&format!("Metadata: {}", Self::format_json(value, 2)));
        }
        self.line("");

        let size = |bytes: u64| {
            if human_readable {
                Self::format_size(bytes)
            } else {
                bytes.to_string()
            }
        };

        let mut total: u64 = 0;
        for row in entries {
            total += row.size;
            let modified = if self.verbose {
                format!("{:<20} ", row.modified.as_deref().unwrap_or("-"))
            } else {
                String::new()
            };
            self.line(&format!(
                "{:>10} {:>10}  {}{}  {}",
                size(row.size),
                size(row.compressed_size),
                modified,
                row.name,
                self.entry_metadata(row)
            ));
        }

        self.line("");
        self.line(&format!(
            "Total: {} files, {}",
            Self::format_number(entries.len()),
            Self::format_size(total)
        ));

        Ok(())
    }

    fn format_rewrite_result(&self, archive: &Path, report: &RewriteReport) -> Result<()> {
        if self.quiet {
            return Ok(());
        }

        if report.changed {
            self.check(&format!(
                "Updated {} metadata in {}",
                report.target,
                archive.display()
            ));
        } else {
            self.check(&format!(
                "{} metadata in {} already up to date",
                report.target,
                archive.display()
            ));
        }

        if self.verbose {
            self.line(&format!(
                "  Entries copied: {}",
                Self::format_number(report.entries_copied)
            ));
            self.line(&format!(
                "  Archive size:   {}",
                Self::format_size(report.archive_size)
            ));
            self.line(&format!("  Duration:       {:?}", report.duration));
        }

        Ok(())
    }

    fn format_warning(&self, message: &str) {
        if self.quiet {
            return;
        }

        if self.use_colors {
            let _ = Term::stderr().write_line(&format!("{} {message}", style("⚠").yellow().bold()));
        } else {
            let _ = Term::stderr().write_line(&format!("WARNING: {message}"));
        }
    }
}
