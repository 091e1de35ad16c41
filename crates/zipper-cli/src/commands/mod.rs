//! Subcommand implementations and shared argument helpers.

pub mod completion;
pub mod create;
pub mod get_metadata;
pub mod list_contents;
pub mod set_metadata;

use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use anyhow::bail;
use serde_json::Value;
use std::path::Path;

/// Rejects archive paths without a `.zip` extension.
pub fn validate_archive_path(path: &Path) -> Result<()> {
    let is_zip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if !is_zip {
        bail!(
            "Archive file must have .zip extension, got: {}",
            path.display()
        );
    }
    Ok(())
}

/// Parses a metadata argument: a path to a `.json` file, or inline JSON.
///
/// Inline JSON that fails to parse is retried with surrounding quotes and
/// backticks stripped and single quotes turned into double quotes.
pub fn parse_metadata(input: &str) -> Result<Value> {
    if input.ends_with(".json") && Path::new(input).is_file() {
        let text = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read metadata file '{input}'"))?;
        return serde_json::from_str(&text).map_err(|e| {
            anyhow!(
                "Invalid JSON in metadata file '{input}': {e}\n\
                 HINT: The file must contain a single JSON value."
            )
        });
    }

    if let Ok(value) = serde_json::from_str(input) {
        return Ok(value);
    }

    let relaxed = input
        .trim_matches(|c: char| matches!(c, '`' | '"' | '\'' | ' '))
        .replace("`\"", "\"")
        .replace('\'', "\"");
    serde_json::from_str(&relaxed).map_err(|e| {
        anyhow!(
            "Invalid JSON metadata: {e}\n\
             HINT: Use valid JSON with double quotes, e.g. '{{\"key\": \"value\"}}', \
             or the path to a .json file."
        )
    })
}
