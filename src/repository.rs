//! # Repository Fetching
//!
//! This module provides the `RepositoryFetcher`, which turns a parsed template
//! source and an optional reference into a checked-out working tree.
//!
//! ## Design
//!
//! Git access goes through the **`GitOperations`** trait. In the main
//! application `DefaultGitOperations` wraps the system `git` command; tests
//! replace it with a mock to simulate repositories, missing refs and
//! ambiguous hashes without touching the network.
//!
//! ## Checkout Strategy
//!
//! - No reference: full clone of the default branch, tags included.
//! - Commit hash (7 to 40 hex digits): full clone, resolve the hash against the
//!   object database, then hard reset to it.
//! - Anything else: shallow fetch as a branch, retried as a tag when the
//!   remote has no such branch.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::git::{CloneOptions, CloneRef};
use crate::reference::{match_hash_prefix, GitReference, RefKind};
use crate::source::RepositoryDescriptor;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Clones `url` into `target_dir`, either fully or as a shallow fetch of a
    /// single branch or tag.
    fn clone_repo(
        &self,
        url: &str,
        options: &CloneOptions,
        target_dir: &Path,
        deadline: Deadline,
    ) -> Result<()>;

    /// Lists the tag names of a local clone.
    fn list_tags(&self, repo_dir: &Path) -> Result<Vec<String>>;

    /// Resolves a revision to a commit hash, dereferencing annotated tags.
    fn resolve_commit(&self, repo_dir: &Path, rev: &str) -> Result<String>;

    /// Looks up object names starting with `prefix` through an index.
    ///
    /// `Ok(None)` means no index is available and the caller should scan
    /// every object instead.
    fn find_objects_by_prefix(&self, _repo_dir: &Path, _prefix: &str) -> Result<Option<Vec<String>>> {
        Ok(None)
    }

    /// Lists every object name in the clone.
    fn list_objects(&self, repo_dir: &Path) -> Result<Vec<String>>;

    /// Hard-resets the working tree to `commit` and removes untracked files.
    fn hard_reset(&self, repo_dir: &Path, commit: &str) -> Result<()>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command to perform real Git operations.
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn clone_repo(
        &self,
        url: &str,
        options: &CloneOptions,
        target_dir: &Path,
        deadline: Deadline,
    ) -> Result<()> {
        crate::git::clone_repo(url, options, target_dir, deadline)
    }

    fn list_tags(&self, repo_dir: &Path) -> Result<Vec<String>> {
        crate::git::list_tags(repo_dir)
    }

    fn resolve_commit(&self, repo_dir: &Path, rev: &str) -> Result<String> {
        crate::git::resolve_commit(repo_dir, rev)
    }

    fn find_objects_by_prefix(&self, repo_dir: &Path, prefix: &str) -> Result<Option<Vec<String>>> {
        crate::git::disambiguate_prefix(repo_dir, prefix)
    }

    fn list_objects(&self, repo_dir: &Path) -> Result<Vec<String>> {
        crate::git::list_objects(repo_dir)
    }

    fn hard_reset(&self, repo_dir: &Path, commit: &str) -> Result<()> {
        crate::git::hard_reset(repo_dir, commit)
    }
}

/// A checked-out working tree, optionally narrowed to a subpath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    root: PathBuf,
    subpath: Option<String>,
}

impl Checkout {
    /// Wraps a working tree, failing if `subpath` does not exist in it.
    pub fn new(root: &Path, subpath: Option<&str>) -> Result<Self> {
        let subpath = subpath
            .map(|s| s.trim_matches('/'))
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let checkout = Self {
            root: root.to_path_buf(),
            subpath,
        };

        if let Some(subpath) = &checkout.subpath {
            if !checkout.dir().is_dir() {
                return Err(Error::Checkout {
                    r#ref: subpath.clone(),
                    message: "subpath does not exist in repository".to_string(),
                });
            }
        }

        Ok(checkout)
    }

    /// The working-tree root, where git commands run.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The template directory: the root chrooted at the subpath, if any.
    pub fn dir(&self) -> PathBuf {
        match &self.subpath {
            Some(subpath) => self.root.join(subpath),
            None => self.root.clone(),
        }
    }

    pub fn subpath(&self) -> Option<&str> {
        self.subpath.as_deref()
    }
}

/// Fetches working trees for template repositories.
pub struct RepositoryFetcher {
    git_ops: Box<dyn GitOperations>,
}

impl Default for RepositoryFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryFetcher {
    /// Creates a fetcher backed by the system `git` command.
    pub fn new() -> Self {
        Self {
            git_ops: Box::new(DefaultGitOperations),
        }
    }

    /// Creates a fetcher with a custom `GitOperations` implementation.
    pub fn with_operations(git_ops: Box<dyn GitOperations>) -> Self {
        Self { git_ops }
    }

    /// Checks out `repo` at `reference` into `target_dir`.
    ///
    /// The caller owns `target_dir` and is responsible for removing it.
    pub fn fetch(
        &self,
        repo: &RepositoryDescriptor,
        reference: Option<&str>,
        target_dir: &Path,
        deadline: Deadline,
    ) -> Result<Checkout> {
        if repo.link.trim().is_empty() {
            return Err(Error::GitClone {
                url: String::new(),
                r#ref: reference.unwrap_or("HEAD").to_string(),
                message: "empty repository URL".to_string(),
                hint: None,
            });
        }

        match reference {
            None => {
                info!("Cloning {}", repo.link);
                self.git_ops
                    .clone_repo(&repo.link, &CloneOptions::full(), target_dir, deadline)?;
            }
            Some(value) => {
                let reference = GitReference::classify(value);
                info!("Cloning {} at {}", repo.link, reference);
                match reference.kind {
                    RefKind::Commit => self.checkout_hash(&repo.link, &reference, target_dir, deadline)?,
                    _ => self.checkout_symbolic(&repo.link, &reference, target_dir, deadline)?,
                }
            }
        }

        Checkout::new(target_dir, repo.subpath.as_deref())
    }

    /// Full clone, then resolve the (possibly abbreviated) hash and reset.
    fn checkout_hash(
        &self,
        url: &str,
        reference: &GitReference,
        target_dir: &Path,
        deadline: Deadline,
    ) -> Result<()> {
        self.git_ops
            .clone_repo(url, &CloneOptions::full(), target_dir, deadline)?;
        deadline.check("resolve commit hash")?;

        let commit = if reference.is_full_hash() {
            reference.value.to_ascii_lowercase()
        } else {
            self.resolve_prefix(target_dir, &reference.value)?
        };

        debug!("Resolved {} to {}", reference.value, commit);
        self.git_ops.hard_reset(target_dir, &commit)
    }

    fn resolve_prefix(&self, repo_dir: &Path, prefix: &str) -> Result<String> {
        if let Some(indexed) = self.git_ops.find_objects_by_prefix(repo_dir, prefix)? {
            return match_hash_prefix(prefix, indexed);
        }

        // No index available: scan every object in the clone
        debug!("Scanning all objects for prefix {}", prefix);
        let objects = self.git_ops.list_objects(repo_dir)?;
        match_hash_prefix(prefix, objects)
    }

    /// Shallow fetch as a branch, falling back to a tag of the same name.
    fn checkout_symbolic(
        &self,
        url: &str,
        reference: &GitReference,
        target_dir: &Path,
        deadline: Deadline,
    ) -> Result<()> {
        let as_branch = CloneOptions::single(CloneRef::Branch(reference.value.clone()));
        match self.git_ops.clone_repo(url, &as_branch, target_dir, deadline) {
            Err(Error::NoSuchRef { .. }) => {
                debug!("No branch {} in {}, trying as tag", reference.value, url);
                let as_tag = CloneOptions::single(CloneRef::Tag(reference.as_tag().value));
                self.git_ops.clone_repo(url, &as_tag, target_dir, deadline)
            }
            other => other,
        }
    }

    /// Resolves `rev` to a commit and hard-resets the working tree to it.
    ///
    /// Returns the commit hash.
    pub fn hard_reset(&self, repo_root: &Path, rev: &str) -> Result<String> {
        let commit = self.git_ops.resolve_commit(repo_root, rev)?;
        self.git_ops.hard_reset(repo_root, &commit)?;
        Ok(commit)
    }

    /// Lists the tag names of a clone.
    pub fn list_tags(&self, repo_root: &Path) -> Result<Vec<String>> {
        self.git_ops.list_tags(repo_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::parse;
    use crate::testing::{read_commit, MockGitOperations, MockRepo};

    const URL: &str = "https://github.com/acme/templates";

    fn hash(fill: char, prefix: &str) -> String {
        let mut hash = prefix.to_string();
        while hash.len() < 40 {
            hash.push(fill);
        }
        hash
    }

    fn fetcher(ops: MockGitOperations) -> RepositoryFetcher {
        RepositoryFetcher::with_operations(Box::new(ops))
    }

    #[test]
    fn test_fetch_without_reference_clones_default_branch() {
        let head = hash('0', "aaaa");
        let ops = MockGitOperations::new().with_repo(URL, MockRepo::new(&head));
        let calls = ops.calls();
        let temp = tempfile::TempDir::new().unwrap();

        let checkout = fetcher(ops)
            .fetch(&parse(URL).unwrap(), None, temp.path(), Deadline::none())
            .unwrap();

        assert_eq!(read_commit(checkout.dir().as_path()), head);
        assert_eq!(calls.lock().unwrap().as_slice(), [format!("clone {} HEAD", URL)]);
    }

    #[test]
    fn test_fetch_branch() {
        let commit = hash('1', "bbbb");
        let repo = MockRepo::new(&hash('0', "aaaa")).with_branch("develop", &commit);
        let ops = MockGitOperations::new().with_repo(URL, repo);
        let temp = tempfile::TempDir::new().unwrap();

        let checkout = fetcher(ops)
            .fetch(&parse(URL).unwrap(), Some("develop"), temp.path(), Deadline::none())
            .unwrap();
        assert_eq!(read_commit(checkout.root()), commit);
    }

    #[test]
    fn test_fetch_falls_back_to_tag() {
        let commit = hash('2', "cccc");
        let repo = MockRepo::new(&hash('0', "aaaa")).with_tag("v1.0.0", &commit);
        let ops = MockGitOperations::new().with_repo(URL, repo);
        let calls = ops.calls();
        let temp = tempfile::TempDir::new().unwrap();

        let checkout = fetcher(ops)
            .fetch(&parse(URL).unwrap(), Some("v1.0.0"), temp.path(), Deadline::none())
            .unwrap();

        assert_eq!(read_commit(checkout.root()), commit);
        let calls = calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            [
                format!("clone {} branch v1.0.0", URL),
                format!("clone {} tag v1.0.0", URL),
            ]
        );
    }

    #[test]
    fn test_fetch_missing_ref_fails() {
        let ops = MockGitOperations::new().with_repo(URL, MockRepo::new(&hash('0', "aaaa")));
        let temp = tempfile::TempDir::new().unwrap();

        let err = fetcher(ops)
            .fetch(&parse(URL).unwrap(), Some("nope"), temp.path(), Deadline::none())
            .unwrap_err();
        assert!(matches!(err, Error::NoSuchRef { .. }));
    }

    #[test]
    fn test_fetch_full_hash_resets_directly() {
        let head = hash('0', "aaaa");
        let old = hash('3', "dddd");
        let repo = MockRepo::new(&head).with_object(&old);
        let ops = MockGitOperations::new().with_repo(URL, repo);
        let calls = ops.calls();
        let temp = tempfile::TempDir::new().unwrap();

        let checkout = fetcher(ops)
            .fetch(&parse(URL).unwrap(), Some(&old), temp.path(), Deadline::none())
            .unwrap();

        assert_eq!(read_commit(checkout.root()), old);
        let calls = calls.lock().unwrap();
        assert!(!calls.iter().any(|c| c.starts_with("scan") || c.starts_with("index")));
    }

    #[test]
    fn test_fetch_short_hash_uses_prefix_index() {
        let old = hash('3', "dddd123");
        let repo = MockRepo::new(&hash('0', "aaaa")).with_object(&old);
        let ops = MockGitOperations::new().with_repo(URL, repo).with_prefix_index();
        let calls = ops.calls();
        let temp = tempfile::TempDir::new().unwrap();

        let checkout = fetcher(ops)
            .fetch(&parse(URL).unwrap(), Some("dddd123"), temp.path(), Deadline::none())
            .unwrap();

        assert_eq!(read_commit(checkout.root()), old);
        let calls = calls.lock().unwrap();
        assert!(calls.contains(&"index dddd123".to_string()));
        assert!(!calls.contains(&"scan".to_string()));
    }

    #[test]
    fn test_fetch_short_hash_falls_back_to_scan() {
        let old = hash('3', "dddd123");
        let repo = MockRepo::new(&hash('0', "aaaa")).with_object(&old);
        let ops = MockGitOperations::new().with_repo(URL, repo);
        let calls = ops.calls();
        let temp = tempfile::TempDir::new().unwrap();

        let checkout = fetcher(ops)
            .fetch(&parse(URL).unwrap(), Some("DDDD123"), temp.path(), Deadline::none())
            .unwrap();

        assert_eq!(read_commit(checkout.root()), old);
        assert!(calls.lock().unwrap().contains(&"scan".to_string()));
    }

    #[test]
    fn test_fetch_ambiguous_hash() {
        let repo = MockRepo::new(&hash('0', "aaaa"))
            .with_object(&hash('1', "abcdef1"))
            .with_object(&hash('2', "abcdef1"));
        let ops = MockGitOperations::new().with_repo(URL, repo);
        let temp = tempfile::TempDir::new().unwrap();

        let err = fetcher(ops)
            .fetch(&parse(URL).unwrap(), Some("abcdef1"), temp.path(), Deadline::none())
            .unwrap_err();
        assert!(matches!(err, Error::AmbiguousRef { .. }));
        assert!(err.to_string().contains("ambiguous hash"));
    }

    #[test]
    fn test_fetch_unknown_hash() {
        let ops = MockGitOperations::new().with_repo(URL, MockRepo::new(&hash('0', "aaaa")));
        let temp = tempfile::TempDir::new().unwrap();

        let err = fetcher(ops)
            .fetch(&parse(URL).unwrap(), Some("fedcba9"), temp.path(), Deadline::none())
            .unwrap_err();
        assert!(err.to_string().contains("no matching hash"));
    }

    #[test]
    fn test_fetch_empty_link() {
        let mut repo = parse(URL).unwrap();
        repo.link = String::new();
        let temp = tempfile::TempDir::new().unwrap();

        let err = fetcher(MockGitOperations::new())
            .fetch(&repo, None, temp.path(), Deadline::none())
            .unwrap_err();
        assert!(matches!(err, Error::GitClone { .. }));
    }

    #[test]
    fn test_fetch_with_subpath() {
        let head = hash('0', "aaaa");
        let repo = MockRepo::new(&head).with_dir("modules/vpc");
        let ops = MockGitOperations::new().with_repo(URL, repo);
        let temp = tempfile::TempDir::new().unwrap();
        let source = format!("{}//modules/vpc", URL);

        let checkout = fetcher(ops)
            .fetch(&parse(&source).unwrap(), None, temp.path(), Deadline::none())
            .unwrap();
        assert_eq!(checkout.subpath(), Some("modules/vpc"));
        assert_eq!(checkout.dir(), temp.path().join("modules/vpc"));
    }

    #[test]
    fn test_fetch_missing_subpath() {
        let ops = MockGitOperations::new().with_repo(URL, MockRepo::new(&hash('0', "aaaa")));
        let temp = tempfile::TempDir::new().unwrap();
        let source = format!("{}//missing", URL);

        let err = fetcher(ops)
            .fetch(&parse(&source).unwrap(), None, temp.path(), Deadline::none())
            .unwrap_err();
        assert!(matches!(err, Error::Checkout { .. }));
    }

    #[test]
    fn test_fetch_respects_expired_deadline() {
        let ops = MockGitOperations::new().with_repo(URL, MockRepo::new(&hash('0', "aaaa")));
        let temp = tempfile::TempDir::new().unwrap();

        let err = fetcher(ops)
            .fetch(
                &parse(URL).unwrap(),
                None,
                temp.path(),
                Deadline::after(std::time::Duration::ZERO),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[test]
    fn test_hard_reset_to_tag() {
        let head = hash('0', "aaaa");
        let tagged = hash('4', "eeee");
        let repo = MockRepo::new(&head).with_tag("v0.1.0", &tagged);
        let ops = MockGitOperations::new().with_repo(URL, repo);
        let temp = tempfile::TempDir::new().unwrap();
        let fetcher = fetcher(ops);

        let checkout = fetcher
            .fetch(&parse(URL).unwrap(), None, temp.path(), Deadline::none())
            .unwrap();
        assert_eq!(fetcher.list_tags(checkout.root()).unwrap(), vec!["v0.1.0"]);

        let commit = fetcher.hard_reset(checkout.root(), "v0.1.0").unwrap();
        assert_eq!(commit, tagged);
        assert_eq!(read_commit(checkout.root()), tagged);
    }
}
