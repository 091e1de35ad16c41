//! Zipper CLI - Command-line utility for ZIP archives with JSON metadata.

mod cli;
mod commands;
mod error;
mod output;
mod progress;

use anyhow::Result;
use clap::Parser;
use tracing::Level;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet);

    match &cli.command {
        cli::Commands::Create(args) => {
            commands::create::execute(args, &*formatter, cli.quiet || cli.json)
        }
        cli::Commands::GetMetadata(args) => commands::get_metadata::execute(args, &*formatter),
        cli::Commands::ListContents(args) => commands::list_contents::execute(args, &*formatter),
        cli::Commands::SetMetadata(args) => commands::set_metadata::execute(args, &*formatter),
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(())
        }
    }
}

/// Logs to stderr: DEBUG with `--verbose`, otherwise WARN.
fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
