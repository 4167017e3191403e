//! # Error Handling
//!
//! This module defines the centralized error type for `catalog-sync`. It uses
//! the `thiserror` library to build a single `Error` enum covering every
//! failure mode of the synchronization pipeline.
//!
//! ## Taxonomy
//!
//! - **`SourceParse`**: a template source string could not be parsed. Always
//!   fatal and never retried.
//! - **`GitClone`** / **`GitCommand`**: the VCS transport failed (network,
//!   authentication, missing binary). Fatal to the sync attempt.
//! - **`NoSuchRef`** / **`AmbiguousRef`** / **`Checkout`**: a reference could
//!   not be resolved or checked out. Fatal when resolving one explicit ref,
//!   skipped when resolving one of many candidate versions.
//! - **`SchemaExtraction`** / **`Compatibility`**: a version's schema could not
//!   be loaded, or it declares a server constraint that is not met. Same
//!   fatal-vs-skip split as above.
//! - **`Persistence`**: the template store failed.
//! - **`NoVersions`**: a full sync found nothing publishable.
//! - **`Timeout`**: a sync attempt ran past its deadline.
//! - **`QueueFull`** / **`QueueClosed`**: the background queue refused a
//!   request.
//!
//! Fatal errors are recorded verbatim into a template's status message, so
//! the `Display` text of each variant is user-visible.

use std::time::Duration;

use thiserror::Error;

/// Main error type for catalog-sync operations
#[derive(Error, Debug)]
pub enum Error {
    /// A template source string could not be parsed into a repository
    /// descriptor.
    #[error("Invalid template source {source_str:?}: {message}")]
    SourceParse { source_str: String, message: String },

    /// An error occurred while cloning or fetching a Git repository.
    ///
    /// Includes the repository URL, ref (branch/tag/hash), error message, and
    /// an optional hint for resolution.
    #[error("Git clone error for {url}@{r#ref}: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    GitClone {
        url: String,
        r#ref: String,
        message: String,
        /// Optional hint for how to resolve the clone issue
        hint: Option<String>,
    },

    /// An error occurred while executing a Git command.
    #[error("Git command failed in {dir}: {command} - {stderr}")]
    GitCommand {
        command: String,
        dir: String,
        stderr: String,
    },

    /// A reference could not be found in the repository.
    #[error("{message}: {r#ref}")]
    NoSuchRef { r#ref: String, message: String },

    /// An abbreviated commit hash matched more than one object.
    #[error("ambiguous hash {r#ref}: matches {}", candidates.join(", "))]
    AmbiguousRef {
        r#ref: String,
        candidates: Vec<String>,
    },

    /// The working tree could not be moved to the requested revision.
    #[error("Checkout error for {r#ref}: {message}")]
    Checkout { r#ref: String, message: String },

    /// The schema loader could not produce a schema for a template directory.
    #[error("Schema extraction error for template {template}: {message}")]
    SchemaExtraction { template: String, message: String },

    /// A template version declares a server constraint that the running
    /// server does not satisfy, or the constraint cannot be evaluated.
    #[error("Incompatible template version (constraint {constraint:?}, server {server_version:?}): {message}")]
    Compatibility {
        constraint: String,
        server_version: String,
        message: String,
    },

    /// The template store failed.
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// A full sync discovered no valid version to publish.
    #[error("no valid versions found for template {template}")]
    NoVersions { template: String },

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    /// The background sync queue is at capacity.
    #[error("Sync queue is full ({capacity} pending requests)")]
    QueueFull { capacity: usize },

    /// The background sync queue has been shut down.
    #[error("Sync queue is closed")]
    QueueClosed,

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),

    /// A JSON (de)serialization error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Returns `true` for errors that abort a whole multi-version sync even
    /// when they happen while processing a single candidate.
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Persistence { .. } | Error::LockPoisoned { .. }
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
