//! List-contents command implementation

use crate::cli::ListContentsArgs;
use crate::commands::validate_archive_path;
use crate::error::add_archive_context;
use crate::output::EntryRow;
use crate::output::OutputFormatter;
use anyhow::Result;
use tracing::debug;
use zipper_core::ArchiveSession;
use zipper_core::OpenMode;

pub fn execute(args: &ListContentsArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    validate_archive_path(&args.archive)?;
    let mut session = add_archive_context(
        ArchiveSession::open(&args.archive, OpenMode::Read),
        &args.archive,
    )?;

    // A bad archive comment should not hide the listing
    let archive_metadata = session.get_archive_metadata().unwrap_or_else(|err| {
        debug!(archive = %args.archive.display(), error = %err, "archive comment is not metadata");
        formatter.format_warning(&format!("Archive comment is not JSON metadata: {err}"));
        None
    });

    let rows: Vec<EntryRow> = add_archive_context(session.list_contents(), &args.archive)?
        .iter()
        .map(EntryRow::from)
        .collect();
    add_archive_context(session.close(), &args.archive)?;

    formatter.format_listing(
        &args.archive,
        archive_metadata.as_ref(),
        &rows,
        args.human_readable,
    )
}
