//! # Resync Command Implementation
//!
//! Re-extracts the schema of one stored template version from its pinned
//! source. A UI schema edited by a user is kept.

use anyhow::Result;
use clap::Args;

use catalog_sync::deadline::Deadline;

use crate::cli::GlobalArgs;

/// Refresh the schema of a stored template version
#[derive(Args, Debug)]
pub struct ResyncArgs {
    /// Id of the template version
    #[arg(value_name = "VERSION_ID")]
    pub id: u64,
}

/// Execute the resync command
pub fn execute(args: ResyncArgs, global: &GlobalArgs) -> Result<()> {
    let synchronizer = global.synchronizer()?;
    let deadline = Deadline::after(synchronizer.config().timeout);

    let version = synchronizer.resync_template_version(args.id, deadline)?;
    println!("✅ Refreshed {} {}", version.name, version.version);
    Ok(())
}
