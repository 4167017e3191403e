//! # Catalog Sync Library
//!
//! This library keeps a catalog of infrastructure templates in step with the
//! git repositories they live in. It is used by the `catalog-sync`
//! command-line tool but can also be embedded in a server that triggers
//! synchronization in the background.
//!
//! ## Quick Example
//!
//! ```
//! use catalog_sync::source;
//! use catalog_sync::version::candidates_from_tags;
//!
//! // Parse a template source
//! let repo = source::parse("git::https://github.com/acme/templates.git//modules/vpc?ref=v1.2.0").unwrap();
//! assert_eq!(repo.namespace, "acme");
//! assert_eq!(repo.name, "templates");
//! assert_eq!(repo.subpath.as_deref(), Some("modules/vpc"));
//! assert_eq!(repo.reference.as_deref(), Some("v1.2.0"));
//!
//! // Pin it at another version
//! assert_eq!(
//!     repo.versioned_source("v1.3.0"),
//!     "https://github.com/acme/templates.git//modules/vpc?ref=v1.3.0"
//! );
//!
//! // Only semantic-version tags become template versions
//! let candidates = candidates_from_tags(["v2.0.0", "latest", "v1.0.0"]);
//! let tags: Vec<_> = candidates.iter().map(|c| c.tag.as_str()).collect();
//! assert_eq!(tags, ["v1.0.0", "v2.0.0"]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Sources (`source`)**: a template's free-text source string, parsed into
//!   a repository descriptor (link, namespace, name, subpath, reference).
//! - **Repository Fetching (`repository`, `git`, `reference`)**: clones a
//!   working tree at a branch, tag or (abbreviated) commit hash using the
//!   system `git`.
//! - **Versions (`version`, `schema`)**: semver tags are the candidate
//!   versions; each is checked out, its schema extracted and its declared
//!   server constraint evaluated.
//! - **Persistence (`model`, `store`)**: templates and versions are upserted
//!   into a `TemplateStore`, keeping user edits of UI schemas.
//! - **Synchronization (`sync`, `queue`)**: the `Synchronizer` drives one
//!   attempt end to end and records the template's status; the `SyncQueue`
//!   runs attempts in the background with bounded concurrency.
//!
//! ## Execution Flow
//!
//! 1.  **Begin**: the template is recorded as `Initializing`.
//! 2.  **Fetch**: the repository is cloned into a temporary directory.
//! 3.  **Enumerate**: tags are filtered to semantic versions, ascending.
//! 4.  **Validate**: each candidate is checked out and its schema extracted;
//!     failing candidates are skipped.
//! 5.  **Persist**: the surviving versions are written in one batch.
//! 6.  **Finish**: the template becomes `Ready`, or `Error` with the reason.

pub mod config;
pub mod deadline;
pub mod defaults;
pub mod error;
pub mod git;
pub mod icon;
pub mod model;
pub mod queue;
pub mod reference;
pub mod repository;
pub mod schema;
pub mod source;
pub mod store;
pub mod sync;
pub mod version;

#[cfg(test)]
mod source_proptest;
#[cfg(test)]
mod testing;
