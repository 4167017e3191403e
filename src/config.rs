//! # Synchronization Configuration
//!
//! `SyncConfig` gathers the knobs of a synchronizer and its queue. The CLI
//! fills it from flags and `CATALOG_SYNC_*` environment variables; library
//! users can start from `SyncConfig::default()` and override fields.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::Result;

/// The version of the server templates are synchronized for.
///
/// Templates may declare which server versions they support. Development
/// builds skip that check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerVersion(String);

impl ServerVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty, `dev`, or any version with a `-dev` suffix.
    pub fn is_development(&self) -> bool {
        let version = self.0.to_ascii_lowercase();
        version.is_empty() || version == "dev" || version.ends_with("-dev")
    }

    /// Parses the version as semver, allowing a single leading `v`.
    pub fn semver(&self) -> Result<semver::Version> {
        let version = self.0.strip_prefix('v').unwrap_or(&self.0);
        Ok(semver::Version::parse(version)?)
    }
}

impl Default for ServerVersion {
    fn default() -> Self {
        Self::new(defaults::default_server_version())
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Settings shared by the synchronizer and the sync queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub server_version: ServerVersion,
    /// Directory under which per-attempt working trees are created.
    pub workdir_root: PathBuf,
    /// Time budget of one background sync attempt.
    pub timeout: Duration,
    /// Number of sync jobs run concurrently by the queue.
    pub workers: usize,
    /// Pending requests the queue accepts before refusing new ones.
    pub queue_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_version: ServerVersion::default(),
            workdir_root: defaults::default_workdir_root(),
            timeout: defaults::DEFAULT_SYNC_TIMEOUT,
            workers: defaults::DEFAULT_WORKERS,
            queue_capacity: defaults::DEFAULT_QUEUE_CAPACITY,
        }
    }
}
