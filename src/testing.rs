//! Test doubles shared by the unit tests.
//!
//! `MockGitOperations` simulates remote repositories as a set of named
//! commits. A "checkout" is a directory holding a `COMMIT` marker file with
//! the current commit hash, which `MockSchemaLoader` reads to decide what to
//! return.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::git::{CloneOptions, CloneRef};
use crate::repository::GitOperations;
use crate::schema::{SchemaGroup, SchemaLoader};

pub const COMMIT_MARKER: &str = "COMMIT";

/// Reads the commit a mock checkout points at.
pub fn read_commit(dir: &Path) -> String {
    fs::read_to_string(dir.join(COMMIT_MARKER)).unwrap_or_default()
}

/// Builds a 40-character hash from a short hex prefix.
pub fn fake_hash(prefix: &str) -> String {
    format!("{:0<40}", prefix)
}

/// A simulated remote repository.
#[derive(Debug, Clone, Default)]
pub struct MockRepo {
    head: String,
    branches: BTreeMap<String, String>,
    tags: Vec<(String, String)>,
    extra_objects: Vec<String>,
    dirs: Vec<String>,
    files: Vec<(String, String)>,
}

impl MockRepo {
    pub fn new(head: &str) -> Self {
        Self {
            head: head.to_string(),
            ..Default::default()
        }
    }

    pub fn with_branch(mut self, name: &str, commit: &str) -> Self {
        self.branches.insert(name.to_string(), commit.to_string());
        self
    }

    pub fn with_tag(mut self, name: &str, commit: &str) -> Self {
        self.tags.push((name.to_string(), commit.to_string()));
        self
    }

    pub fn with_object(mut self, object: &str) -> Self {
        self.extra_objects.push(object.to_string());
        self
    }

    pub fn with_dir(mut self, dir: &str) -> Self {
        self.dirs.push(dir.to_string());
        self
    }

    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    fn objects(&self) -> Vec<String> {
        let mut objects = vec![self.head.clone()];
        objects.extend(self.branches.values().cloned());
        objects.extend(self.tags.iter().map(|(_, commit)| commit.clone()));
        objects.extend(self.extra_objects.iter().cloned());
        objects
    }

    fn lookup_tag(&self, name: &str) -> Option<&String> {
        self.tags
            .iter()
            .find(|(tag, _)| tag == name)
            .map(|(_, commit)| commit)
    }

    fn write_commit(&self, root: &Path, commit: &str) -> Result<()> {
        fs::write(root.join(COMMIT_MARKER), commit)?;
        for dir in &self.dirs {
            fs::write(root.join(dir).join(COMMIT_MARKER), commit)?;
        }
        Ok(())
    }
}

/// Mock git operations for testing
#[derive(Default)]
pub struct MockGitOperations {
    repos: HashMap<String, MockRepo>,
    checkouts: Mutex<HashMap<PathBuf, String>>,
    calls: Arc<Mutex<Vec<String>>>,
    prefix_index: bool,
}

impl MockGitOperations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(mut self, url: &str, repo: MockRepo) -> Self {
        self.repos.insert(url.to_string(), repo);
        self
    }

    /// Answer prefix lookups from an index instead of forcing a scan.
    pub fn with_prefix_index(mut self) -> Self {
        self.prefix_index = true;
        self
    }

    /// Shared log of the operations performed, for assertions.
    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn repo_at(&self, dir: &Path) -> Result<MockRepo> {
        let checkouts = self.checkouts.lock().unwrap();
        checkouts
            .get(dir)
            .and_then(|url| self.repos.get(url))
            .cloned()
            .ok_or_else(|| Error::GitCommand {
                command: "git".to_string(),
                dir: dir.display().to_string(),
                stderr: "not a git repository".to_string(),
            })
    }
}

impl GitOperations for MockGitOperations {
    fn clone_repo(
        &self,
        url: &str,
        options: &CloneOptions,
        target_dir: &Path,
        deadline: Deadline,
    ) -> Result<()> {
        deadline.check("git clone")?;
        let label = match &options.reference {
            None => "HEAD".to_string(),
            Some(CloneRef::Branch(name)) => format!("branch {}", name),
            Some(CloneRef::Tag(name)) => format!("tag {}", name),
        };
        self.record(format!("clone {} {}", url, label));

        let repo = self.repos.get(url).ok_or_else(|| Error::GitClone {
            url: url.to_string(),
            r#ref: label.clone(),
            message: "repository not found".to_string(),
            hint: None,
        })?;

        let no_ref = |name: &str| Error::NoSuchRef {
            r#ref: name.to_string(),
            message: "no matching ref".to_string(),
        };
        let commit = match &options.reference {
            None => repo.head.clone(),
            Some(CloneRef::Branch(name)) => {
                repo.branches.get(name).cloned().ok_or_else(|| no_ref(name))?
            }
            Some(CloneRef::Tag(name)) => repo.lookup_tag(name).cloned().ok_or_else(|| no_ref(name))?,
        };

        if target_dir.exists() {
            fs::remove_dir_all(target_dir)?;
        }
        fs::create_dir_all(target_dir)?;
        for dir in &repo.dirs {
            fs::create_dir_all(target_dir.join(dir))?;
        }
        for (path, content) in &repo.files {
            let path = target_dir.join(path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, content)?;
        }
        repo.write_commit(target_dir, &commit)?;

        self.checkouts
            .lock()
            .unwrap()
            .insert(target_dir.to_path_buf(), url.to_string());
        Ok(())
    }

    fn list_tags(&self, repo_dir: &Path) -> Result<Vec<String>> {
        let repo = self.repo_at(repo_dir)?;
        Ok(repo.tags.into_iter().map(|(tag, _)| tag).collect())
    }

    fn resolve_commit(&self, repo_dir: &Path, rev: &str) -> Result<String> {
        let repo = self.repo_at(repo_dir)?;
        if rev == "HEAD" {
            return Ok(read_commit(repo_dir));
        }
        repo.lookup_tag(rev)
            .or_else(|| repo.branches.get(rev))
            .cloned()
            .or_else(|| repo.objects().into_iter().find(|o| o == rev))
            .ok_or_else(|| Error::NoSuchRef {
                r#ref: rev.to_string(),
                message: "reference not found".to_string(),
            })
    }

    fn find_objects_by_prefix(&self, repo_dir: &Path, prefix: &str) -> Result<Option<Vec<String>>> {
        if !self.prefix_index {
            return Ok(None);
        }
        self.record(format!("index {}", prefix));
        let prefix = prefix.to_ascii_lowercase();
        let repo = self.repo_at(repo_dir)?;
        Ok(Some(
            repo.objects()
                .into_iter()
                .filter(|o| o.starts_with(&prefix))
                .collect(),
        ))
    }

    fn list_objects(&self, repo_dir: &Path) -> Result<Vec<String>> {
        self.record("scan".to_string());
        Ok(self.repo_at(repo_dir)?.objects())
    }

    fn hard_reset(&self, repo_dir: &Path, commit: &str) -> Result<()> {
        self.record(format!("reset {}", commit));
        let repo = self.repo_at(repo_dir)?;
        if !repo.objects().iter().any(|o| o == commit) {
            return Err(Error::Checkout {
                r#ref: commit.to_string(),
                message: "unknown revision".to_string(),
            });
        }
        repo.write_commit(repo_dir, commit)
    }
}

/// Mock schema loader keyed by the commit of the checkout it is given.
///
/// Unless overridden, every commit yields a schema whose `region` variable
/// defaults to the commit hash and an empty UI schema.
#[derive(Default)]
pub struct MockSchemaLoader {
    ui_schemas: HashMap<String, Value>,
    failing: HashSet<String>,
}

impl MockSchemaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ui_schema(mut self, commit: &str, ui_schema: Value) -> Self {
        self.ui_schemas.insert(commit.to_string(), ui_schema);
        self
    }

    pub fn failing_on(mut self, commit: &str) -> Self {
        self.failing.insert(commit.to_string());
        self
    }

    pub fn schema_for(commit: &str) -> Value {
        json!({
            "components": {"schemas": {"variables": {"properties": {
                "region": {"type": "string", "default": commit}
            }}}}
        })
    }
}

impl SchemaLoader for MockSchemaLoader {
    fn load(&self, template_dir: &Path, template_name: &str) -> Result<SchemaGroup> {
        let commit = read_commit(template_dir);
        if commit.is_empty() || self.failing.contains(&commit) {
            return Err(Error::SchemaExtraction {
                template: template_name.to_string(),
                message: format!("cannot load schema at {}", commit),
            });
        }

        let ui_schema = self
            .ui_schemas
            .get(&commit)
            .cloned()
            .unwrap_or_else(|| json!({}));
        Ok(SchemaGroup::new(Self::schema_for(&commit), ui_schema))
    }
}
