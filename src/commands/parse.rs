//! # Parse Command Implementation
//!
//! Parses a template source string and prints the repository it refers to.
//! Nothing is fetched.

use anyhow::Result;
use clap::Args;

use catalog_sync::source::{self, RepositoryDescriptor};

/// Parse a template source
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Template source, e.g. `git::https://github.com/org/repo.git//dir?ref=v1.0.0`
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Print the descriptor as JSON
    #[arg(long)]
    pub json: bool,

    /// Also print the source pinned at this reference
    #[arg(long, value_name = "REF")]
    pub pin: Option<String>,
}

/// Execute the parse command
pub fn execute(args: ParseArgs) -> Result<()> {
    let repo = source::parse(&args.source)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&repo)?);
    } else {
        print!("{}", render(&repo));
    }

    if let Some(reference) = &args.pin {
        println!("{}", repo.versioned_source(reference));
    }

    Ok(())
}

fn render(repo: &RepositoryDescriptor) -> String {
    let mut out = String::new();
    let dash = |value: Option<&str>| value.unwrap_or("-").to_string();
    let rows = [
        ("namespace", repo.namespace.clone()),
        ("name", repo.name.clone()),
        ("link", repo.link.clone()),
        ("subpath", dash(repo.subpath.as_deref())),
        ("reference", dash(repo.reference.as_deref())),
        ("driver", dash(Some(repo.driver.as_str()).filter(|d| !d.is_empty()))),
    ];
    for (key, value) in rows {
        out.push_str(&format!("{:<10} {}\n", key, value));
    }
    out
}
