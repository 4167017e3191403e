//! # Version Enumeration and Validation
//!
//! A template's versions are the semantic-version tags of its repository.
//!
//! ## Process
//!
//! 1.  **Tag Listing**: all tags of the shared clone are listed.
//!
//! 2.  **Semantic Version Filtering**: each tag is parsed as a semantic
//!     version, optionally prefixed with a single `v`. Tags that do not parse
//!     are dropped. The remaining candidates are sorted ascending; tags that
//!     compare equal keep the order git listed them in.
//!
//! 3.  **Validation**: each candidate is checked out in turn on the same
//!     clone, its schema is extracted, and the server version constraint it
//!     declares is evaluated. A candidate that fails any step is skipped; the
//!     others are unaffected. Only an expired deadline (or another batch-fatal
//!     error) aborts the whole run.

use std::fmt;

use log::{debug, warn};
use semver::{Version, VersionReq};

use crate::config::ServerVersion;
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::repository::{Checkout, RepositoryFetcher};
use crate::schema::{SchemaGroup, SchemaLoader};

/// A tag that parses as a semantic version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateVersion {
    pub version: Version,
    /// The tag exactly as it appears in the repository.
    pub tag: String,
}

impl fmt::Display for CandidateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

/// A candidate that checked out, produced a schema and passed the
/// compatibility check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedVersion {
    pub candidate: CandidateVersion,
    pub commit: String,
    pub schema: SchemaGroup,
}

/// Parses a tag as a semantic version, allowing a single leading `v`.
pub fn parse_semver_tag(tag: &str) -> Option<Version> {
    // Common patterns: v1.2.3, 1.2.3, refs/tags/v1.2.3
    let tag = tag.strip_prefix("refs/tags/").unwrap_or(tag);
    let version = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(version).ok()
}

/// Keeps the tags that parse as semantic versions, sorted ascending.
pub fn candidates_from_tags<I, S>(tags: I) -> Vec<CandidateVersion>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut candidates: Vec<CandidateVersion> = tags
        .into_iter()
        .filter_map(|tag| {
            let tag = tag.as_ref();
            match parse_semver_tag(tag) {
                Some(version) => Some(CandidateVersion {
                    version,
                    tag: tag.to_string(),
                }),
                None => {
                    debug!("Ignoring non-semver tag {}", tag);
                    None
                }
            }
        })
        .collect();

    // sort_by is stable: equal versions keep their listing order
    candidates.sort_by(|a, b| a.version.cmp(&b.version));
    candidates
}

/// Lists the candidate versions of a clone.
pub fn enumerate_versions(fetcher: &RepositoryFetcher, checkout: &Checkout) -> Result<Vec<CandidateVersion>> {
    let tags = fetcher.list_tags(checkout.root())?;
    Ok(candidates_from_tags(tags))
}

/// Checks the server version against the constraint declared by `schema`.
///
/// Development builds and schemas without a constraint always pass.
pub fn check_compatibility(schema: &SchemaGroup, server_version: &ServerVersion) -> Result<()> {
    let Some(constraint) = schema.version_constraint() else {
        return Ok(());
    };
    if server_version.is_development() {
        debug!("Skipping constraint {} for development server build", constraint);
        return Ok(());
    }

    let incompatible = |message: String| Error::Compatibility {
        constraint: constraint.to_string(),
        server_version: server_version.to_string(),
        message,
    };

    let requirement =
        VersionReq::parse(constraint).map_err(|e| incompatible(format!("invalid constraint: {}", e)))?;
    let version = server_version
        .semver()
        .map_err(|e| incompatible(format!("invalid server version: {}", e)))?;

    if requirement.matches(&version) {
        Ok(())
    } else {
        Err(incompatible("server version does not satisfy the constraint".to_string()))
    }
}

/// Validates candidate versions one by one on a shared clone.
pub struct VersionValidator<'a> {
    fetcher: &'a RepositoryFetcher,
    loader: &'a dyn SchemaLoader,
    server_version: &'a ServerVersion,
}

impl<'a> VersionValidator<'a> {
    pub fn new(
        fetcher: &'a RepositoryFetcher,
        loader: &'a dyn SchemaLoader,
        server_version: &'a ServerVersion,
    ) -> Self {
        Self {
            fetcher,
            loader,
            server_version,
        }
    }

    /// Returns the candidates that validate, in input order.
    pub fn validate(
        &self,
        checkout: &Checkout,
        template_name: &str,
        candidates: &[CandidateVersion],
        deadline: Deadline,
    ) -> Result<Vec<ValidatedVersion>> {
        let mut validated = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            deadline.check(&format!("validating version {} of {}", candidate, template_name))?;

            match self.validate_one(checkout, template_name, candidate) {
                Ok(version) => validated.push(version),
                Err(e) if e.is_fatal_for_batch() => return Err(e),
                Err(e) => warn!("Skipping version {} of {}: {}", candidate, template_name, e),
            }
        }

        Ok(validated)
    }

    fn validate_one(
        &self,
        checkout: &Checkout,
        template_name: &str,
        candidate: &CandidateVersion,
    ) -> Result<ValidatedVersion> {
        let commit = self.fetcher.hard_reset(checkout.root(), &candidate.tag)?;
        let schema = self.loader.load(&checkout.dir(), template_name)?;
        check_compatibility(&schema, self.server_version)?;

        Ok(ValidatedVersion {
            candidate: candidate.clone(),
            commit,
            schema,
        })
    }
}
