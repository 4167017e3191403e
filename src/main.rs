//! # Catalog Sync CLI
//!
//! This is the binary entry point for the `catalog-sync` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Initialising logging from `--log-level` (`RUST_LOG` takes precedence).
//! - Executing the appropriate command based on the parsed arguments.
//!
//! The synchronization logic lives in the `catalog_sync` library crate; the
//! binary is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
