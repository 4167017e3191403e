//! Persistent template entities.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::SchemaGroup;

/// Lifecycle state of a template's most recent sync attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStatus {
    #[default]
    Initializing,
    Ready,
    Error,
}

impl fmt::Display for TemplateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TemplateStatus::Initializing => "initializing",
            TemplateStatus::Ready => "ready",
            TemplateStatus::Error => "error",
        })
    }
}

/// A catalog template. Unique on `(name, project_id)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    pub source: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub status: TemplateStatus,
    #[serde(default)]
    pub status_message: String,
}

/// One published version of a template. Unique on
/// `(name, version, project_id)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateVersion {
    pub id: u64,
    pub template_id: u64,
    pub name: String,
    /// The tag or reference exactly as requested, not normalized.
    pub version: String,
    /// Source string pinned at `version`.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub schema: Value,
    pub ui_schema: Value,
    /// The UI schema as last extracted, regardless of user edits.
    pub original_ui_schema: Value,
    pub schema_default_value: Value,
    /// Set once a user edits `ui_schema`; later syncs keep their edit.
    #[serde(default)]
    pub ui_schema_user_edited: bool,
}

impl TemplateVersion {
    /// Builds a freshly extracted version. `id` is assigned by the store.
    pub fn from_schema(
        template: &Template,
        version: &str,
        source: String,
        schema: &SchemaGroup,
    ) -> Self {
        Self {
            id: 0,
            template_id: template.id,
            name: template.name.clone(),
            version: version.to_string(),
            source,
            project_id: template.project_id.clone(),
            schema: schema.schema.clone(),
            ui_schema: schema.ui_schema.clone(),
            original_ui_schema: schema.ui_schema.clone(),
            schema_default_value: schema.default_values(),
            ui_schema_user_edited: false,
        }
    }

    pub fn key(&self) -> (String, String, Option<String>) {
        (self.name.clone(), self.version.clone(), self.project_id.clone())
    }

    /// Applies this freshly synced version on top of the stored one.
    ///
    /// The stored id is kept. A user-edited UI schema and its marker survive;
    /// everything else is overwritten.
    pub fn merge_over(mut self, existing: &TemplateVersion) -> Self {
        self.id = existing.id;
        if existing.ui_schema_user_edited {
            self.ui_schema = existing.ui_schema.clone();
            self.ui_schema_user_edited = true;
        }
        self
    }

    /// Refreshes the schema-derived fields in place, honouring user edits.
    pub fn refresh_schema(&mut self, schema: &SchemaGroup) {
        self.schema = schema.schema.clone();
        self.original_ui_schema = schema.ui_schema.clone();
        self.schema_default_value = schema.default_values();
        if !self.ui_schema_user_edited {
            self.ui_schema = schema.ui_schema.clone();
        }
    }
}
