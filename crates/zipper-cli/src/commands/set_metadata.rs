//! Set-metadata command implementation

use crate::cli::SetMetadataArgs;
use crate::commands::parse_metadata;
use crate::commands::validate_archive_path;
use crate::error::add_archive_context;
use crate::output::OutputFormatter;
use anyhow::Result;
use anyhow::bail;
use serde_json::Value;
use zipper_core::MetadataRewriter;
use zipper_core::MetadataTarget;
use zipper_core::MetadataUpdate;

pub fn execute(args: &SetMetadataArgs, formatter: &dyn OutputFormatter) -> Result<()> {
    validate_archive_path(&args.archive)?;

    let target = args
        .file
        .as_ref()
        .map_or(MetadataTarget::Archive, MetadataTarget::entry);
    let update = build_update(args)?;

    let report = add_archive_context(
        MetadataRewriter::new(&args.archive).rewrite(&target, &update),
        &args.archive,
    )?;
    formatter.format_rewrite_result(&args.archive, &report)
}

fn build_update(args: &SetMetadataArgs) -> Result<MetadataUpdate> {
    let Some(input) = args.metadata.as_deref() else {
        return Ok(MetadataUpdate::Clear);
    };
    let value = parse_metadata(input)?;

    if !args.merge {
        return Ok(MetadataUpdate::Set(value));
    }
    match value {
        Value::Object(map) => Ok(MetadataUpdate::Merge(map)),
        other => bail!(
            "--merge needs a JSON object, got: {other}\n\
             HINT: Drop --merge to replace the metadata with this value."
        ),
    }
}
