//! CLI argument parsing using clap.

use clap::ArgGroup;
use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "zipper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new archive with optional metadata
    Create(CreateArgs),
    /// Read metadata from an archive or one of its files
    GetMetadata(GetMetadataArgs),
    /// List archive contents with sizes and metadata
    ListContents(ListContentsArgs),
    /// Change metadata of an existing archive in place
    SetMetadata(SetMetadataArgs),
    /// Generate shell completions
    Completion(CompletionArgs),
}

#[derive(clap::Args)]
pub struct CreateArgs {
    /// Archive to create (must end in .zip)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Files to add to the archive
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// JSON metadata for the archive (inline JSON or a .json file)
    #[arg(long, value_name = "JSON")]
    pub archive_metadata: Option<String>,

    /// JSON metadata applied to every added file
    #[arg(long, value_name = "JSON")]
    pub file_metadata: Option<String>,

    /// Compression level (0 stores files uncompressed)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub compression_level: Option<u8>,

    /// Overwrite the archive if it exists
    #[arg(short = 'f', long)]
    pub force: bool,
}

#[derive(clap::Args)]
pub struct GetMetadataArgs {
    /// Archive to read
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Entry to read metadata from (default: archive and all entries)
    #[arg(short = 'f', long, value_name = "FILE")]
    pub file: Option<String>,
}

#[derive(clap::Args)]
pub struct ListContentsArgs {
    /// Archive to list
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Show sizes in human-readable format
    #[arg(short = 'H', long)]
    pub human_readable: bool,
}

#[derive(clap::Args)]
#[command(group(ArgGroup::new("target").required(true).args(["file", "archive_level"])))]
#[command(group(ArgGroup::new("change").required(true).args(["metadata", "clear"])))]
pub struct SetMetadataArgs {
    /// Archive to modify
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// New metadata (inline JSON or a .json file)
    #[arg(value_name = "JSON", allow_hyphen_values = true)]
    pub metadata: Option<String>,

    /// Entry whose metadata is changed
    #[arg(short = 'f', long, value_name = "FILE")]
    pub file: Option<String>,

    /// Change the archive-level metadata
    #[arg(long = "archive")]
    pub archive_level: bool,

    /// Remove the metadata
    #[arg(long, conflicts_with = "merge")]
    pub clear: bool,

    /// Merge top-level keys into the existing object instead of replacing it
    #[arg(long)]
    pub merge: bool,
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}
