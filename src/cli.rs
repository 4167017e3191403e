//! CLI argument parsing and command dispatch

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use catalog_sync::config::{ServerVersion, SyncConfig};
use catalog_sync::defaults;
use catalog_sync::store::MemoryStore;
use catalog_sync::sync::Synchronizer;

use crate::commands;

/// Catalog Sync - Keep a template catalog in step with git repositories
#[derive(Parser, Debug)]
#[command(name = "catalog-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Path of the template store file.
    ///
    /// Defaults to the platform data directory
    /// (`~/.local/share/catalog-sync/store.json` on Linux).
    #[arg(long, global = true, value_name = "FILE", env = "CATALOG_SYNC_STORE")]
    pub store: Option<PathBuf>,

    /// Server version checked against template constraints.
    ///
    /// An empty value, `dev`, or a `-dev` suffix skips the check.
    #[arg(long, global = true, value_name = "VERSION", env = "CATALOG_SYNC_SERVER_VERSION")]
    pub server_version: Option<String>,

    /// Directory for temporary working trees.
    #[arg(long, global = true, value_name = "DIR", env = "CATALOG_SYNC_WORKDIR")]
    pub workdir: Option<PathBuf>,

    /// Time budget of a background sync attempt, in seconds.
    #[arg(long, global = true, value_name = "SECS", env = "CATALOG_SYNC_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Number of concurrent background sync jobs.
    #[arg(long, global = true, value_name = "N", env = "CATALOG_SYNC_WORKERS")]
    pub workers: Option<usize>,
}

impl GlobalArgs {
    pub fn sync_config(&self) -> SyncConfig {
        let defaults = SyncConfig::default();
        SyncConfig {
            server_version: self
                .server_version
                .as_deref()
                .map(ServerVersion::new)
                .unwrap_or(defaults.server_version),
            workdir_root: self.workdir.clone().unwrap_or(defaults.workdir_root),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            workers: self.workers.unwrap_or(defaults.workers),
            queue_capacity: defaults.queue_capacity,
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(defaults::default_store_path)
    }

    pub fn open_store(&self) -> Result<Arc<MemoryStore>> {
        let path = self.store_path();
        let store = MemoryStore::open(&path)
            .with_context(|| format!("Failed to open template store {}", path.display()))?;
        Ok(Arc::new(store))
    }

    pub fn synchronizer(&self) -> Result<Synchronizer> {
        Ok(Synchronizer::new(self.open_store()?, self.sync_config()))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a template source and print its components
    Parse(commands::parse::ParseArgs),

    /// List the semantic versions published by a template repository
    Versions(commands::versions::VersionsArgs),

    /// Synchronize a template from its source into the store
    Sync(commands::sync::SyncArgs),

    /// Re-extract the schema of one stored template version
    Resync(commands::resync::ResyncArgs),

    /// Synchronize many templates through the background queue
    Queue(commands::queue::QueueArgs),

    /// List stored templates and their versions
    Ls(commands::ls::LsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.global.log_level);

        match self.command {
            Commands::Parse(args) => commands::parse::execute(args),
            Commands::Versions(args) => commands::versions::execute(args, &self.global),
            Commands::Sync(args) => commands::sync::execute(args, &self.global),
            Commands::Resync(args) => commands::resync::execute(args, &self.global),
            Commands::Queue(args) => commands::queue::execute(args, &self.global),
            Commands::Ls(args) => commands::ls::execute(args, &self.global),
        }
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A logger may already be installed when running under tests
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
