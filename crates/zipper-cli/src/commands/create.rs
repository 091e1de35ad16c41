//! Create command implementation

use crate::cli::CreateArgs;
use crate::commands::parse_metadata;
use crate::commands::validate_archive_path;
use crate::error::add_archive_context;
use crate::error::convert_zipper_error;
use crate::output::CreationSummary;
use crate::output::OutputFormatter;
use crate::progress::CliProgress;
use anyhow::Result;
use std::time::Instant;
use tracing::debug;
use zipper_core::ArchiveSession;
use zipper_core::OpenMode;
use zipper_core::OverwritePolicy;
use zipper_core::ZipperConfig;
use zipper_core::ZipperError;

pub fn execute(args: &CreateArgs, formatter: &dyn OutputFormatter, quiet: bool) -> Result<()> {
    let start = Instant::now();
    validate_archive_path(&args.archive)?;

    // Parse everything before the archive file is created
    let archive_metadata = args.archive_metadata.as_deref().map(parse_metadata).transpose()?;
    let file_metadata = args.file_metadata.as_deref().map(parse_metadata).transpose()?;

    let mut config = ZipperConfig::default();
    if args.force {
        config = config.with_overwrite(OverwritePolicy::Truncate);
    }
    if let Some(level) = args.compression_level {
        config = config.with_compression_level(level);
    }

    let mut session = add_archive_context(
        ArchiveSession::open_with(&args.archive, OpenMode::Write, &config),
        &args.archive,
    )?;

    let mut progress = if !quiet && CliProgress::should_show() {
        CliProgress::new(args.files.len(), "Adding")
    } else {
        CliProgress::hidden()
    };

    let mut summary = CreationSummary::default();
    for file in &args.files {
        match session.add_file(file, file_metadata.as_ref()) {
            Ok(()) => {
                summary.files_added += 1;
                if file_metadata.is_some() {
                    summary.files_with_metadata += 1;
                }
                let bytes = std::fs::metadata(file).map_or(0, |m| m.len());
                progress.file_added(bytes);
            }
            Err(
                err @ (ZipperError::SourceNotFound { .. }
                | ZipperError::InvalidSource { .. }
                | ZipperError::DuplicateEntry { .. }),
            ) => {
                debug!(file = %file.display(), error = %err, "skipping file");
                formatter.format_warning(&format!("Skipped {}: {err}", file.display()));
                summary.skipped.push(file.clone());
                progress.file_skipped();
            }
            Err(err) => return Err(convert_zipper_error(err, &args.archive)),
        }
    }
    drop(progress);

    if let Some(metadata) = &archive_metadata {
        add_archive_context(session.set_archive_metadata(metadata), &args.archive)?;
        summary.archive_metadata = true;
    }
    add_archive_context(session.close(), &args.archive)?;

    summary.archive_size = std::fs::metadata(&args.archive)?.len();
    summary.duration = start.elapsed();
    formatter.format_creation_result(&args.archive, &summary)
}
