//! Shared test utilities for integration and E2E tests.
//!
//! This module builds throwaway git repositories on the local filesystem so
//! the real `git` binary can be exercised without network access.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let Some(repo) = TemplateRepo::new("vpc") else { return };
//!     repo.write_template("v1").commit("initial").tag("v1.0.0");
//!     // ... test code
//! }
//! ```

use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{git_available, schemas, should_skip_network_tests, TemplateRepo};
}

/// UI schema snippets for template versions.
#[allow(dead_code)]
pub mod schemas {
    /// UI schema declaring a `region` variable with a default.
    pub fn with_default(default: &str) -> String {
        format!(
            r#"components:
  schemas:
    variables:
      properties:
        region:
          type: string
          default: {}
"#,
            default
        )
    }

    /// UI schema requiring a server version.
    pub fn with_constraint(constraint: &str) -> String {
        format!(
            r#"info:
  x-catalog:
    version: "{}"
"#,
            constraint
        )
    }
}

/// Returns `true` if a usable `git` binary is on the PATH.
pub fn git_available() -> bool {
    let available = Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false);
    if !available {
        println!("Skipping test: git is not available");
    }
    available
}

/// Check if network tests should be skipped.
///
/// Returns `true` if the `SKIP_NETWORK_TESTS` environment variable is set.
#[allow(dead_code)]
pub fn should_skip_network_tests() -> bool {
    std::env::var("SKIP_NETWORK_TESTS").is_ok()
}

/// A local git repository holding a template.
pub struct TemplateRepo {
    temp_dir: assert_fs::TempDir,
    path: PathBuf,
}

#[allow(dead_code)]
impl TemplateRepo {
    /// Initialises an empty repository named `name` on branch `main`.
    ///
    /// Returns `None` when git is not installed.
    pub fn new(name: &str) -> Option<Self> {
        if !git_available() {
            return None;
        }

        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(name);
        std::fs::create_dir_all(&path).expect("Failed to create repository directory");

        let repo = Self { temp_dir, path };
        repo.git(&["init", "--quiet", "--initial-branch=main"]);
        Some(repo)
    }

    /// Runs git in the repository and returns its trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.path)
            .args([
                "-c",
                "user.name=Catalog Test",
                "-c",
                "user.email=test@example.com",
                "-c",
                "commit.gpgsign=false",
                "-c",
                "tag.gpgsign=false",
            ])
            .args(args)
            .output()
            .expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// Writes a file relative to the repository root.
    pub fn write(&self, path: &str, content: &str) -> &Self {
        let file = self.path.join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&file, content).expect("Failed to write file");
        self
    }

    /// Writes a complete template (main.tf plus UI schema) into `dir`.
    pub fn write_template_in(&self, dir: &str, default: &str) -> &Self {
        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir.trim_end_matches('/'))
        };
        self.write(&format!("{}main.tf", prefix), "variable \"region\" {}\n");
        self.write(&format!("{}schema.yaml", prefix), &schemas::with_default(default))
    }

    /// Writes a complete template at the repository root.
    pub fn write_template(&self, default: &str) -> &Self {
        self.write_template_in("", default)
    }

    /// Removes a file relative to the repository root.
    pub fn remove(&self, path: &str) -> &Self {
        self.git(&["rm", "--quiet", path]);
        self
    }

    /// Stages everything and commits.
    pub fn commit(&self, message: &str) -> &Self {
        self.git(&["add", "--all"]);
        self.git(&["commit", "--quiet", "--allow-empty", "-m", message]);
        self
    }

    /// Creates a lightweight tag at HEAD.
    pub fn tag(&self, name: &str) -> &Self {
        self.git(&["tag", name]);
        self
    }

    /// Creates an annotated tag at HEAD.
    pub fn annotated_tag(&self, name: &str) -> &Self {
        self.git(&["tag", "-a", name, "-m", name]);
        self
    }

    pub fn checkout(&self, branch: &str) -> &Self {
        self.git(&["checkout", "--quiet", branch]);
        self
    }

    pub fn new_branch(&self, branch: &str) -> &Self {
        self.git(&["checkout", "--quiet", "-b", branch]);
        self
    }

    /// Full hash of HEAD.
    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"])
    }

    /// `file://` URL of the repository.
    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scratch directory next to the repository, for stores and workdirs.
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_repo_commits_and_tags() {
        let Some(repo) = TemplateRepo::new("vpc") else {
            return;
        };
        repo.write_template("a").commit("initial").tag("v1.0.0");

        assert_eq!(repo.head().len(), 40);
        assert_eq!(repo.git(&["tag", "--list"]), "v1.0.0");
        assert!(repo.url().starts_with("file:///"));
    }

    #[test]
    fn test_schemas_are_valid_yaml() {
        for schema in [schemas::with_default("x"), schemas::with_constraint(">=1.0.0")] {
            serde_yaml::from_str::<serde_yaml::Value>(&schema).expect("Schema should be valid YAML");
        }
    }
}
