//! Template schema extraction.
//!
//! A template version carries two documents: the schema describing its
//! configurable inputs, and a UI schema with presentation hints. The UI
//! schema may also pin the server versions the template works with under
//! `info.x-catalog.version`.

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// OpenAPI extension holding catalog metadata.
pub const CATALOG_EXTENSION: &str = "x-catalog";
/// Key of the server version constraint inside the extension.
pub const VERSION_CONSTRAINT_KEY: &str = "version";

/// File that marks a directory as a template.
pub const TEMPLATE_ENTRYPOINT: &str = "main.tf";
/// UI schema file names, in lookup order.
pub const UI_SCHEMA_FILES: [&str; 3] = ["schema.yaml", "schema.yml", "schema.json"];
const README_FILE: &str = "README.md";
const OPENAPI_VERSION: &str = "3.0.3";

/// The schema pair extracted from one template version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaGroup {
    pub schema: Value,
    pub ui_schema: Value,
}

impl SchemaGroup {
    pub fn new(schema: Value, ui_schema: Value) -> Self {
        Self { schema, ui_schema }
    }

    /// The server version requirement declared by the UI schema, if any.
    pub fn version_constraint(&self) -> Option<&str> {
        let pointer = format!("/info/{}/{}", CATALOG_EXTENSION, VERSION_CONSTRAINT_KEY);
        self.ui_schema
            .pointer(&pointer)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Default values of the template's variables, keyed by variable name.
    pub fn default_values(&self) -> Value {
        let defaults: Map<String, Value> = self
            .schema
            .pointer("/components/schemas/variables/properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .filter_map(|(name, property)| {
                        property
                            .get("default")
                            .map(|default| (name.clone(), default.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Value::Object(defaults)
    }
}

/// Extracts a `SchemaGroup` from a checked-out template directory.
pub trait SchemaLoader: Send + Sync {
    fn load(&self, template_dir: &Path, template_name: &str) -> Result<SchemaGroup>;
}

/// Reads the schema pair from files in the template directory.
///
/// The directory must contain `main.tf`. The UI schema is read from the first
/// of `schema.yaml`, `schema.yml` or `schema.json` that exists; a template
/// without one has a null UI schema and therefore no version constraint. The
/// schema is an OpenAPI document whose components come from the UI schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSchemaLoader;

impl FileSchemaLoader {
    fn read_ui_schema(template_dir: &Path) -> Result<Value> {
        for file in UI_SCHEMA_FILES {
            let path = template_dir.join(file);
            if !path.is_file() {
                continue;
            }
            debug!("Reading UI schema from {}", path.display());
            let content = fs::read_to_string(&path)?;
            // YAML is a superset of JSON, so one parser handles all three
            let value: Value = serde_yaml::from_str(&content)?;
            return Ok(value);
        }
        Ok(Value::Null)
    }
}

impl SchemaLoader for FileSchemaLoader {
    fn load(&self, template_dir: &Path, template_name: &str) -> Result<SchemaGroup> {
        if !template_dir.join(TEMPLATE_ENTRYPOINT).is_file() {
            return Err(Error::SchemaExtraction {
                template: template_name.to_string(),
                message: format!("{} not found in {}", TEMPLATE_ENTRYPOINT, template_dir.display()),
            });
        }

        let ui_schema = Self::read_ui_schema(template_dir).map_err(|e| Error::SchemaExtraction {
            template: template_name.to_string(),
            message: e.to_string(),
        })?;

        let components = ui_schema
            .get("components")
            .cloned()
            .unwrap_or_else(|| json!({}));

        let mut schema = json!({
            "openapi": OPENAPI_VERSION,
            "info": {
                "title": format!("OpenAPI schema for template {}", template_name),
            },
            "components": components,
        });

        let readme = template_dir.join(README_FILE);
        if readme.is_file() {
            schema["x-readme"] = Value::String(fs::read_to_string(readme)?);
        }

        Ok(SchemaGroup::new(schema, ui_schema))
    }
}
