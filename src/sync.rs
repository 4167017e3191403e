//! # Template Synchronization
//!
//! The `Synchronizer` drives a sync attempt end to end: it parses the
//! template source, fetches the repository, enumerates and validates
//! versions, resolves the icon, and persists the outcome.
//!
//! ## Entry Points
//!
//! - [`Synchronizer::sync_template`]: publish every valid semver tag of a
//!   repository and drop versions whose tags are gone.
//! - [`Synchronizer::sync_template_from_ref`]: publish exactly the reference
//!   named by the source's `?ref=`, leaving other versions alone.
//! - [`Synchronizer::resync_template_version`]: re-extract the schema of one
//!   stored version in place.
//! - [`Synchronizer::handle`]: dispatch a queued [`SyncRequest`].
//!
//! All entry points are idempotent.
//!
//! ## Status
//!
//! Every attempt first records its template as `Initializing`, so a failure
//! is always observable. Whatever happens next, the attempt ends by
//! recording `Ready` or `Error` with the error text.

use std::fs;
use std::sync::Arc;

use log::{error, info};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use crate::config::SyncConfig;
use crate::deadline::Deadline;
use crate::defaults::WORKDIR_PREFIX;
use crate::error::{Error, Result};
use crate::icon;
use crate::model::{Template, TemplateStatus, TemplateVersion};
use crate::repository::RepositoryFetcher;
use crate::schema::{FileSchemaLoader, SchemaLoader};
use crate::source::{self, RepositoryDescriptor};
use crate::store::TemplateStore;
use crate::version::{check_compatibility, enumerate_versions, VersionValidator};

/// A request to synchronize a template from its source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRequest {
    /// Template name; defaults to the repository name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    pub source: String,
}

impl TemplateRequest {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_catalog(mut self, catalog_id: impl Into<String>) -> Self {
        self.catalog_id = Some(catalog_id.into());
        self
    }

    /// Whether the source pins a single reference with `?ref=`.
    pub fn has_reference(&self) -> bool {
        source::parse(&self.source).is_ok_and(|repo| repo.reference.is_some())
    }

    fn template_name(&self) -> Result<String> {
        match self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => Ok(name.to_string()),
            None => Ok(source::parse(&self.source)?.name),
        }
    }
}

/// A unit of work for the sync queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncRequest {
    Template(TemplateRequest),
    TemplateVersion { id: u64 },
}

impl std::fmt::Display for SyncRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncRequest::Template(request) => write!(f, "template {}", request.source),
            SyncRequest::TemplateVersion { id } => write!(f, "template version {}", id),
        }
    }
}

/// The persisted outcome of a successful sync.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub template: Template,
    pub versions: Vec<TemplateVersion>,
}

/// Synchronizes templates from git repositories into a [`TemplateStore`].
pub struct Synchronizer {
    fetcher: RepositoryFetcher,
    loader: Box<dyn SchemaLoader>,
    store: Arc<dyn TemplateStore>,
    config: SyncConfig,
}

impl Synchronizer {
    /// Creates a synchronizer using the system `git` and the file-based
    /// schema loader.
    pub fn new(store: Arc<dyn TemplateStore>, config: SyncConfig) -> Self {
        Self::with_components(
            RepositoryFetcher::new(),
            Box::new(FileSchemaLoader),
            store,
            config,
        )
    }

    pub fn with_components(
        fetcher: RepositoryFetcher,
        loader: Box<dyn SchemaLoader>,
        store: Arc<dyn TemplateStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            fetcher,
            loader,
            store,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn TemplateStore> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Dispatches a queued request.
    pub fn handle(&self, request: &SyncRequest, deadline: Deadline) -> Result<()> {
        match request {
            SyncRequest::Template(request) if request.has_reference() => {
                self.sync_template_from_ref(request, deadline).map(|_| ())
            }
            SyncRequest::Template(request) => self.sync_template(request, deadline).map(|_| ()),
            SyncRequest::TemplateVersion { id } => {
                self.resync_template_version(*id, deadline).map(|_| ())
            }
        }
    }

    /// Publishes every valid semver tag of the request's repository.
    ///
    /// Versions whose tags no longer exist (or no longer validate) are
    /// removed. Finding no valid version at all is an error.
    pub fn sync_template(&self, request: &TemplateRequest, deadline: Deadline) -> Result<SyncReport> {
        let template = self.begin(request)?;
        let result = self.run_full_sync(&template, request, deadline);
        self.finish(template, result)
    }

    /// Publishes the single reference named by the request's `?ref=`.
    ///
    /// The reference may be any branch, tag or commit hash; the stored
    /// version string is the reference exactly as given.
    pub fn sync_template_from_ref(
        &self,
        request: &TemplateRequest,
        deadline: Deadline,
    ) -> Result<SyncReport> {
        let template = self.begin(request)?;
        let result = self.run_ref_sync(&template, request, deadline);
        self.finish(template, result)
    }

    /// Re-extracts the schema of a stored version from its pinned source.
    ///
    /// Only schema-derived fields change; a user-edited UI schema is kept.
    pub fn resync_template_version(&self, version_id: u64, deadline: Deadline) -> Result<TemplateVersion> {
        let version = self
            .store
            .get_template_version(version_id)?
            .ok_or_else(|| Error::Persistence {
                message: format!("template version {} not found", version_id),
            })?;
        let template = self
            .store
            .get_template(version.template_id)?
            .ok_or_else(|| Error::Persistence {
                message: format!("template {} not found", version.template_id),
            })?;

        self.store
            .set_template_status(template.id, TemplateStatus::Initializing, "")?;
        let result = self.run_resync(version, deadline);
        let outcome = result.as_ref().map(|_| ()).map_err(|e| e.to_string());
        self.record_status(&template, outcome);
        result
    }

    /// Upserts the template row as `Initializing`.
    fn begin(&self, request: &TemplateRequest) -> Result<Template> {
        let name = request.template_name()?;
        let existing = self
            .store
            .find_template(&name, request.project_id.as_deref())?
            .unwrap_or_default();

        let template = Template {
            id: 0,
            name,
            project_id: request.project_id.clone(),
            catalog_id: request.catalog_id.clone().or(existing.catalog_id),
            source: request.source.trim().to_string(),
            icon: existing.icon,
            status: TemplateStatus::Initializing,
            status_message: String::new(),
        };

        info!("Synchronizing template {} from {}", template.name, template.source);
        self.store.upsert_template(template)
    }

    /// Records the final status of an attempt.
    fn finish(&self, template: Template, result: Result<SyncReport>) -> Result<SyncReport> {
        let outcome = result.as_ref().map(|_| ()).map_err(|e| e.to_string());
        self.record_status(&template, outcome);

        result.map(|mut report| {
            report.template.status = TemplateStatus::Ready;
            report.template.status_message.clear();
            report
        })
    }

    fn record_status(&self, template: &Template, outcome: std::result::Result<(), String>) {
        let (status, message) = match &outcome {
            Ok(()) => (TemplateStatus::Ready, ""),
            Err(message) => (TemplateStatus::Error, message.as_str()),
        };

        match &outcome {
            Ok(()) => info!("Template {} is ready", template.name),
            Err(message) => error!("Failed to synchronize template {}: {}", template.name, message),
        }

        if let Err(e) = self.store.set_template_status(template.id, status, message) {
            error!("Failed to update status of template {}: {}", template.name, e);
        }
    }

    fn workdir(&self) -> Result<TempDir> {
        fs::create_dir_all(&self.config.workdir_root)?;
        Ok(tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .tempdir_in(&self.config.workdir_root)?)
    }

    fn run_full_sync(
        &self,
        template: &Template,
        request: &TemplateRequest,
        deadline: Deadline,
    ) -> Result<SyncReport> {
        let repo = source::parse(&request.source)?;
        let workdir = self.workdir()?;
        let checkout = self
            .fetcher
            .fetch(&repo, None, &workdir.path().join("repo"), deadline)?;

        // Icons come from the default branch, before resetting to each tag
        let icon = icon::resolve_icon(&repo, &checkout, None);

        let candidates = enumerate_versions(&self.fetcher, &checkout)?;
        info!("Found {} candidate versions for {}", candidates.len(), template.name);

        let validator = VersionValidator::new(&self.fetcher, self.loader.as_ref(), &self.config.server_version);
        let validated = validator.validate(&checkout, &template.name, &candidates, deadline)?;
        if validated.is_empty() {
            return Err(Error::NoVersions {
                template: template.name.clone(),
            });
        }

        let template = self.store_icon(template, icon)?;
        let versions = validated
            .iter()
            .map(|v| {
                TemplateVersion::from_schema(
                    &template,
                    &v.candidate.tag,
                    repo.versioned_source(&v.candidate.tag),
                    &v.schema,
                )
            })
            .collect();

        let versions = self.store.replace_template_versions(template.id, versions)?;
        info!("Stored {} versions of {}", versions.len(), template.name);
        Ok(SyncReport { template, versions })
    }

    fn run_ref_sync(
        &self,
        template: &Template,
        request: &TemplateRequest,
        deadline: Deadline,
    ) -> Result<SyncReport> {
        let repo = source::parse(&request.source)?;
        let reference = require_reference(&repo, &request.source)?;

        let workdir = self.workdir()?;
        let checkout = self
            .fetcher
            .fetch(&repo, Some(&reference), &workdir.path().join("repo"), deadline)?;

        let schema = self.loader.load(&checkout.dir(), &template.name)?;
        check_compatibility(&schema, &self.config.server_version)?;

        let icon = icon::resolve_icon(&repo, &checkout, Some(&reference));
        let template = self.store_icon(template, icon)?;

        let version = TemplateVersion::from_schema(
            &template,
            &reference,
            repo.versioned_source(&reference),
            &schema,
        );
        let versions = self.store.upsert_template_versions(vec![version])?;
        Ok(SyncReport { template, versions })
    }

    fn run_resync(&self, mut version: TemplateVersion, deadline: Deadline) -> Result<TemplateVersion> {
        let repo = source::parse(&version.source)?;
        let reference = repo
            .reference
            .clone()
            .unwrap_or_else(|| version.version.clone());

        let workdir = self.workdir()?;
        let checkout = self
            .fetcher
            .fetch(&repo, Some(&reference), &workdir.path().join("repo"), deadline)?;

        let schema = self.loader.load(&checkout.dir(), &version.name)?;
        version.refresh_schema(&schema);
        self.store.update_template_version(version.clone())?;

        info!("Refreshed schema of {} {}", version.name, version.version);
        Ok(version)
    }

    fn store_icon(&self, template: &Template, icon: String) -> Result<Template> {
        if template.icon == icon {
            return Ok(template.clone());
        }
        self.store.upsert_template(Template {
            icon,
            ..template.clone()
        })
    }
}

fn require_reference(repo: &RepositoryDescriptor, source: &str) -> Result<String> {
    repo.reference.clone().ok_or_else(|| Error::SourceParse {
        source_str: source.to_string(),
        message: "source does not name a reference".to_string(),
    })
}
