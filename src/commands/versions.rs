//! # Versions Command Implementation
//!
//! Clones a template repository and lists the tags that qualify as versions.
//! With `--validate`, each candidate is also checked out and its schema
//! loaded, showing which versions a sync would publish. The store is not
//! touched.

use anyhow::Result;
use clap::Args;

use catalog_sync::deadline::Deadline;
use catalog_sync::defaults::WORKDIR_PREFIX;
use catalog_sync::repository::RepositoryFetcher;
use catalog_sync::schema::FileSchemaLoader;
use catalog_sync::source;
use catalog_sync::version::{enumerate_versions, VersionValidator};

use crate::cli::GlobalArgs;

/// List the versions of a template repository
#[derive(Args, Debug)]
pub struct VersionsArgs {
    /// Template source
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Check out each version and keep only those that validate
    #[arg(long)]
    pub validate: bool,
}

/// Execute the versions command
pub fn execute(args: VersionsArgs, global: &GlobalArgs) -> Result<()> {
    let config = global.sync_config();
    let repo = source::parse(&args.source)?;
    let deadline = Deadline::after(config.timeout);

    std::fs::create_dir_all(&config.workdir_root)?;
    let workdir = tempfile::Builder::new()
        .prefix(WORKDIR_PREFIX)
        .tempdir_in(&config.workdir_root)?;

    let fetcher = RepositoryFetcher::new();
    let checkout = fetcher.fetch(&repo, None, &workdir.path().join("repo"), deadline)?;
    let candidates = enumerate_versions(&fetcher, &checkout)?;

    if !args.validate {
        for candidate in &candidates {
            println!("{}", candidate.tag);
        }
        return Ok(());
    }

    let loader = FileSchemaLoader;
    let validated = VersionValidator::new(&fetcher, &loader, &config.server_version).validate(
        &checkout,
        &repo.name,
        &candidates,
        deadline,
    )?;
    for version in &validated {
        println!("{} {}", version.candidate.tag, version.commit);
    }

    if validated.is_empty() {
        anyhow::bail!("no valid versions found for template {}", repo.name);
    }
    Ok(())
}
