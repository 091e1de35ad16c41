//! Get-metadata command implementation

use crate::cli::GetMetadataArgs;
use crate::commands::validate_archive_path;
use crate::error::add_archive_context;
use crate::output::EntryRow;
use crate::output::MetadataView;
use crate::output::OutputFormatter;
use anyhow::Result;
use zipper_core::ArchiveSession;
use zipper_core::OpenMode;

pub fn execute(args: &GetMetadataArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    validate_archive_path(&args.archive)?;
    let mut session = add_archive_context(
        ArchiveSession::open(&args.archive, OpenMode::Read),
        &args.archive,
    )?;

    let view = if let Some(file) = &args.file {
        MetadataView::File {
            file: file.clone(),
            metadata: add_archive_context(session.get_file_metadata(file), &args.archive)?,
        }
    } else {
        let archive = add_archive_context(session.get_archive_metadata(), &args.archive)?;
        let entries = add_archive_context(session.list_contents(), &args.archive)?;
        let files = entries
            .iter()
            .map(EntryRow::from)
            .filter(EntryRow::has_metadata)
            .collect();
        MetadataView::Archive { archive, files }
    };

    add_archive_context(session.close(), &args.archive)?;
    formatter.format_metadata(&view)
}
