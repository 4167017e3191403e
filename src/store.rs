//! # Template Store
//!
//! The `TemplateStore` trait is the persistence seam of the synchronizer.
//! `MemoryStore` keeps every record behind a mutex and can mirror its state
//! to a JSON file.
//!
//! ## Semantics
//!
//! - Templates are upserted on `(name, project_id)`, versions on
//!   `(name, version, project_id)`. A missing project id is its own
//!   partition, distinct from every present one.
//! - A version upsert keeps the stored id and, when the stored row was edited
//!   by a user, its UI schema (see [`TemplateVersion::merge_over`]).
//! - Every mutation is all-or-nothing: it is applied to a copy of the state,
//!   written to disk (when file-backed), and only then made visible.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{Template, TemplateStatus, TemplateVersion};

/// Storage for templates and their versions.
pub trait TemplateStore: Send + Sync {
    /// Inserts or updates a template keyed by `(name, project_id)` and returns
    /// the stored row with its id.
    fn upsert_template(&self, template: Template) -> Result<Template>;

    fn get_template(&self, id: u64) -> Result<Option<Template>>;

    fn find_template(&self, name: &str, project_id: Option<&str>) -> Result<Option<Template>>;

    fn list_templates(&self) -> Result<Vec<Template>>;

    fn set_template_status(&self, id: u64, status: TemplateStatus, message: &str) -> Result<()>;

    /// Upserts a batch of versions atomically.
    fn upsert_template_versions(&self, versions: Vec<TemplateVersion>) -> Result<Vec<TemplateVersion>>;

    /// Upserts `versions` and deletes every other version of `template_id`,
    /// atomically.
    fn replace_template_versions(
        &self,
        template_id: u64,
        versions: Vec<TemplateVersion>,
    ) -> Result<Vec<TemplateVersion>>;

    fn get_template_version(&self, id: u64) -> Result<Option<TemplateVersion>>;

    fn list_template_versions(&self, template_id: u64) -> Result<Vec<TemplateVersion>>;

    /// Overwrites an existing version row in place.
    fn update_template_version(&self, version: TemplateVersion) -> Result<()>;

    /// Records a user edit of a version's UI schema.
    fn edit_ui_schema(&self, version_id: u64, ui_schema: Value) -> Result<TemplateVersion>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    next_template_id: u64,
    next_version_id: u64,
    templates: BTreeMap<u64, Template>,
    versions: BTreeMap<u64, TemplateVersion>,
}

impl StoreState {
    fn find_template(&self, name: &str, project_id: Option<&str>) -> Option<&Template> {
        self.templates
            .values()
            .find(|t| t.name == name && t.project_id.as_deref() == project_id)
    }

    fn find_version(&self, key: &(String, String, Option<String>)) -> Option<&TemplateVersion> {
        self.versions.values().find(|v| &v.key() == key)
    }

    fn template_mut(&mut self, id: u64) -> Result<&mut Template> {
        self.templates.get_mut(&id).ok_or_else(|| not_found("template", id))
    }

    fn upsert_version(&mut self, version: TemplateVersion) -> Result<TemplateVersion> {
        if !self.templates.contains_key(&version.template_id) {
            return Err(not_found("template", version.template_id));
        }

        let version = match self.find_version(&version.key()) {
            Some(existing) => version.merge_over(existing),
            None => {
                self.next_version_id += 1;
                TemplateVersion {
                    id: self.next_version_id,
                    ..version
                }
            }
        };

        self.versions.insert(version.id, version.clone());
        Ok(version)
    }
}

fn not_found(kind: &str, id: u64) -> Error {
    Error::Persistence {
        message: format!("{} {} not found", kind, id),
    }
}

/// Mutex-guarded store, optionally mirrored to a JSON file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// Creates an empty store that lives only in memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a file-backed store, starting empty if the file does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let content = fs::read_to_string(path).map_err(persistence)?;
            serde_json::from_str(&content).map_err(persistence)?
        } else {
            StoreState::default()
        };

        debug!("Opened template store at {}", path.display());
        Ok(Self {
            state: Mutex::new(state),
            path: Some(path.to_path_buf()),
        })
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> Result<T> {
        let state = self.state.lock().map_err(|_| Error::LockPoisoned {
            context: "template store".to_string(),
        })?;
        Ok(f(&state))
    }

    /// Applies `f` to a copy of the state, persists it, then publishes it.
    fn commit<T>(&self, f: impl FnOnce(&mut StoreState) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock().map_err(|_| Error::LockPoisoned {
            context: "template store".to_string(),
        })?;

        let mut next = state.clone();
        let result = f(&mut next)?;
        if let Some(path) = &self.path {
            write_state(path, &next)?;
        }
        *state = next;
        Ok(result)
    }
}

fn persistence(e: impl std::fmt::Display) -> Error {
    Error::Persistence {
        message: e.to_string(),
    }
}

/// Writes the state next to `path` and renames it into place.
fn write_state(path: &Path, state: &StoreState) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(persistence)?;

    let json = serde_json::to_vec_pretty(state).map_err(persistence)?;
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(persistence)?;
    file.write_all(&json).map_err(persistence)?;
    file.persist(path).map_err(|e| persistence(e.error))?;
    Ok(())
}

impl TemplateStore for MemoryStore {
    fn upsert_template(&self, template: Template) -> Result<Template> {
        self.commit(|state| {
            let id = match state.find_template(&template.name, template.project_id.as_deref()) {
                Some(existing) => existing.id,
                None => {
                    state.next_template_id += 1;
                    state.next_template_id
                }
            };
            let template = Template { id, ..template };
            state.templates.insert(id, template.clone());
            Ok(template)
        })
    }

    fn get_template(&self, id: u64) -> Result<Option<Template>> {
        self.read(|state| state.templates.get(&id).cloned())
    }

    fn find_template(&self, name: &str, project_id: Option<&str>) -> Result<Option<Template>> {
        self.read(|state| state.find_template(name, project_id).cloned())
    }

    fn list_templates(&self) -> Result<Vec<Template>> {
        self.read(|state| state.templates.values().cloned().collect())
    }

    fn set_template_status(&self, id: u64, status: TemplateStatus, message: &str) -> Result<()> {
        self.commit(|state| {
            let template = state.template_mut(id)?;
            template.status = status;
            template.status_message = message.to_string();
            Ok(())
        })
    }

    fn upsert_template_versions(&self, versions: Vec<TemplateVersion>) -> Result<Vec<TemplateVersion>> {
        self.commit(|state| {
            versions
                .into_iter()
                .map(|version| state.upsert_version(version))
                .collect()
        })
    }

    fn replace_template_versions(
        &self,
        template_id: u64,
        versions: Vec<TemplateVersion>,
    ) -> Result<Vec<TemplateVersion>> {
        self.commit(|state| {
            let stored = versions
                .into_iter()
                .map(|version| state.upsert_version(TemplateVersion { template_id, ..version }))
                .collect::<Result<Vec<_>>>()?;

            state
                .versions
                .retain(|id, v| v.template_id != template_id || stored.iter().any(|s| s.id == *id));
            Ok(stored)
        })
    }

    fn get_template_version(&self, id: u64) -> Result<Option<TemplateVersion>> {
        self.read(|state| state.versions.get(&id).cloned())
    }

    fn list_template_versions(&self, template_id: u64) -> Result<Vec<TemplateVersion>> {
        self.read(|state| {
            state
                .versions
                .values()
                .filter(|v| v.template_id == template_id)
                .cloned()
                .collect()
        })
    }

    fn update_template_version(&self, version: TemplateVersion) -> Result<()> {
        self.commit(|state| {
            let slot = state
                .versions
                .get_mut(&version.id)
                .ok_or_else(|| not_found("template version", version.id))?;
            *slot = version;
            Ok(())
        })
    }

    fn edit_ui_schema(&self, version_id: u64, ui_schema: Value) -> Result<TemplateVersion> {
        self.commit(|state| {
            let version = state
                .versions
                .get_mut(&version_id)
                .ok_or_else(|| not_found("template version", version_id))?;
            version.ui_schema = ui_schema;
            version.ui_schema_user_edited = true;
            Ok(version.clone())
        })
    }
}
