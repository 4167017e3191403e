//! # Sync Command Implementation
//!
//! Synchronizes one template into the store. A source carrying `?ref=`
//! publishes that single reference; otherwise every valid semver tag is
//! published.

use anyhow::Result;
use clap::Args;

use catalog_sync::deadline::Deadline;
use catalog_sync::sync::{SyncReport, TemplateRequest};

use crate::cli::GlobalArgs;

/// Synchronize a template into the store
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Template source
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Template name (defaults to the repository name)
    #[arg(long, value_name = "NAME")]
    pub name: Option<String>,

    /// Project the template belongs to
    #[arg(long, value_name = "ID")]
    pub project: Option<String>,

    /// Catalog the template was discovered from
    #[arg(long, value_name = "ID")]
    pub catalog: Option<String>,

    /// Print the stored template and versions as JSON
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn request(&self) -> TemplateRequest {
        TemplateRequest {
            name: self.name.clone(),
            project_id: self.project.clone(),
            catalog_id: self.catalog.clone(),
            source: self.source.clone(),
        }
    }
}

/// Execute the sync command
pub fn execute(args: SyncArgs, global: &GlobalArgs) -> Result<()> {
    let synchronizer = global.synchronizer()?;
    let deadline = Deadline::after(synchronizer.config().timeout);
    let request = args.request();

    let report = if request.has_reference() {
        synchronizer.sync_template_from_ref(&request, deadline)?
    } else {
        synchronizer.sync_template(&request, deadline)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    println!(
        "✅ Synchronized {} ({} versions)",
        report.template.name,
        report.versions.len()
    );
    for version in &report.versions {
        println!("   {} {}", version.version, version.source);
    }
}
