//! Default values for catalog-sync configuration.
//!
//! This module provides centralized default values used by the library and
//! the CLI, ensuring consistency and avoiding duplication.

use std::path::PathBuf;
use std::time::Duration;

/// Time budget for one background sync attempt.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Number of sync jobs the queue runs at once.
pub const DEFAULT_WORKERS: usize = 4;

/// Number of requests the queue holds before refusing new ones.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Prefix of the temporary working directories created per sync attempt.
pub const WORKDIR_PREFIX: &str = "catalog-sync-";

/// Returns the directory under which per-attempt working trees are created.
pub fn default_workdir_root() -> PathBuf {
    std::env::temp_dir()
}

/// Returns the default location of the template store file.
///
/// Uses the platform-appropriate data directory:
/// - Linux: `~/.local/share/catalog-sync/store.json` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/catalog-sync/store.json`
/// - Windows: `{FOLDERID_RoamingAppData}\catalog-sync\store.json`
///
/// Falls back to `.catalog-sync/store.json` in the current directory if the
/// platform data directory cannot be determined.
///
/// This can be overridden by the `--store` CLI flag or the
/// `CATALOG_SYNC_STORE` environment variable.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("catalog-sync"))
        .unwrap_or_else(|| PathBuf::from(".catalog-sync"))
        .join("store.json")
}

/// The server version reported when none is configured.
pub fn default_server_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
