//! # Ls Command Implementation
//!
//! Lists the templates in the store with their status, and optionally their
//! versions. This command is read-only.

use anyhow::Result;
use clap::Args;

use catalog_sync::model::{Template, TemplateVersion};
use catalog_sync::store::TemplateStore;

use crate::cli::GlobalArgs;

/// List stored templates
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Only show templates with this name
    #[arg(value_name = "NAME")]
    pub name: Option<String>,

    /// Also list each template's versions
    #[arg(short, long)]
    pub versions: bool,

    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(serde::Serialize)]
struct Listing {
    #[serde(flatten)]
    template: Template,
    #[serde(skip_serializing_if = "Option::is_none")]
    versions: Option<Vec<TemplateVersion>>,
}

/// Execute the `ls` command.
pub fn execute(args: LsArgs, global: &GlobalArgs) -> Result<()> {
    let store = global.open_store()?;

    let mut listings = Vec::new();
    for template in store.list_templates()? {
        if args.name.as_ref().is_some_and(|name| name != &template.name) {
            continue;
        }
        let versions = if args.versions {
            Some(store.list_template_versions(template.id)?)
        } else {
            None
        };
        listings.push(Listing { template, versions });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    for listing in &listings {
        println!("{}", format_template(&listing.template));
        for version in listing.versions.iter().flatten() {
            println!("    #{} {}{}", version.id, version.version, edited_marker(version));
        }
    }
    Ok(())
}

fn format_template(template: &Template) -> String {
    let mut line = format!("#{} {} [{}]", template.id, template.name, template.status);
    if let Some(project) = &template.project_id {
        line.push_str(&format!(" project={}", project));
    }
    if !template.status_message.is_empty() {
        line.push_str(&format!(": {}", template.status_message));
    }
    line
}

fn edited_marker(version: &TemplateVersion) -> &'static str {
    if version.ui_schema_user_edited {
        " (edited)"
    } else {
        ""
    }
}
