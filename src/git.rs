//! Git transport built on the system `git` command.
//!
//! Using the system binary means the usual credential sources work without
//! extra configuration:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig
//!
//! Every invocation runs with `GIT_TERMINAL_PROMPT=0` so a missing credential
//! fails fast instead of waiting for input, and honours a [`Deadline`] by
//! killing the child process once it expires.

use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::deadline::Deadline;
use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const TAG_REF_PREFIX: &str = "refs/tags/";

/// Which single reference a shallow clone should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneRef {
    Branch(String),
    Tag(String),
}

impl CloneRef {
    pub fn name(&self) -> &str {
        match self {
            CloneRef::Branch(name) | CloneRef::Tag(name) => name,
        }
    }

    fn refspec(&self) -> String {
        match self {
            CloneRef::Branch(name) => format!("+refs/heads/{0}:refs/remotes/origin/{0}", name),
            CloneRef::Tag(name) => format!("+{1}{0}:{1}{0}", name, TAG_REF_PREFIX),
        }
    }
}

/// Options for [`clone_repo`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Fetch only this reference; `None` clones the default branch with all
    /// tags.
    pub reference: Option<CloneRef>,
    /// History depth; `None` fetches the full history.
    pub depth: Option<u32>,
}

impl CloneOptions {
    /// Full clone of the default branch, tags included.
    pub fn full() -> Self {
        Self::default()
    }

    /// Shallow clone of a single branch or tag.
    pub fn single(reference: CloneRef) -> Self {
        Self {
            reference: Some(reference),
            depth: Some(1),
        }
    }
}

/// Runs `git` with `args`, optionally inside `dir`, bounded by `deadline`.
///
/// A non-zero exit status is returned as part of the `Output`, not as an
/// error; callers decide how to classify it.
pub fn run_git(dir: Option<&Path>, args: &[&str], deadline: Deadline) -> Result<Output> {
    let command_line = format!("git {}", args.join(" "));
    let dir_label = dir
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| ".".to_string());

    let mut cmd = git_command(dir, args);

    debug!("running {} in {}", command_line, dir_label);
    let child = cmd.spawn().map_err(|e| Error::GitCommand {
        command: command_line.clone(),
        dir: dir_label.clone(),
        stderr: e.to_string(),
    })?;

    wait_with_deadline(child, &command_line, deadline)
}

/// Builds the `git` invocation. Prompts are disabled and the locale is pinned
/// so that stderr can be classified by its English messages.
fn git_command(dir: Option<&Path>, args: &[&str]) -> Command {
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    cmd.args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

fn wait_with_deadline(mut child: Child, command_line: &str, deadline: Deadline) -> Result<Output> {
    if !deadline.is_bounded() {
        return Ok(child.wait_with_output()?);
    }

    // Drain pipes on their own threads so a chatty child cannot block on a
    // full pipe while we poll for exit.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if deadline.is_expired() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(deadline.timeout_error(command_line));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Runs a local (non-network) git command and fails on a non-zero exit.
fn run_local(dir: &Path, args: &[&str]) -> Result<Output> {
    let output = run_git(Some(dir), args, Deadline::none())?;
    if !output.status.success() {
        return Err(Error::GitCommand {
            command: format!("git {}", args.join(" ")),
            dir: dir.display().to_string(),
            stderr: stderr_of(&output),
        });
    }
    Ok(output)
}

/// Classifies a failed clone or fetch.
///
/// A reference the remote does not have becomes `NoSuchRef` so the caller
/// can retry it as another kind of reference.
fn clone_error(url: &str, ref_name: &str, stderr: &str) -> Error {
    if stderr.contains("couldn't find remote ref")
        || stderr.contains("not found in upstream origin")
    {
        return Error::NoSuchRef {
            r#ref: ref_name.to_string(),
            message: "no matching ref".to_string(),
        };
    }

    // Provide helpful error message for common auth failures
    let hint = if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
        || stderr.contains("terminal prompts disabled")
    {
        Some(
            "Make sure you have access to the repository. For private repos, ensure you have \
             an SSH key added to ssh-agent, git credentials configured, or a personal access \
             token set up"
                .to_string(),
        )
    } else {
        None
    };

    Error::GitClone {
        url: url.to_string(),
        r#ref: ref_name.to_string(),
        message: stderr.to_string(),
        hint,
    }
}

fn prepare_target(target_dir: &Path) -> Result<()> {
    // Remove target directory if it exists (git won't clone into existing non-empty dir)
    if target_dir.exists() {
        fs::remove_dir_all(target_dir)?;
    }

    if let Some(parent) = target_dir.parent() {
        fs::create_dir_all(parent)?;
    }

    Ok(())
}

/// Clones `url` into `target_dir`.
///
/// Without a reference this is a regular clone of the default branch, which
/// brings all tags along. With a reference it initialises an empty
/// repository and fetches exactly that branch or tag, then checks it out.
pub fn clone_repo(
    url: &str,
    options: &CloneOptions,
    target_dir: &Path,
    deadline: Deadline,
) -> Result<()> {
    prepare_target(target_dir)?;
    let target = target_dir.to_string_lossy().to_string();
    let depth = options.depth.map(|d| d.to_string());

    let Some(reference) = &options.reference else {
        let mut args = vec!["clone", "--quiet"];
        if let Some(depth) = &depth {
            args.extend(["--depth", depth.as_str()]);
        }
        args.extend([url, target.as_str()]);

        let output = run_git(None, &args, deadline)?;
        if !output.status.success() {
            return Err(clone_error(url, "HEAD", &stderr_of(&output)));
        }
        return Ok(());
    };

    let ref_name = reference.name();
    let output = run_git(None, &["init", "--quiet", target.as_str()], deadline)?;
    if !output.status.success() {
        return Err(clone_error(url, ref_name, &stderr_of(&output)));
    }
    run_local(target_dir, &["remote", "add", "origin", url])?;

    let refspec = reference.refspec();
    let mut args = vec!["fetch", "--quiet", "--no-tags"];
    if let Some(depth) = &depth {
        args.extend(["--depth", depth.as_str()]);
    }
    args.extend(["origin", refspec.as_str()]);

    let output = run_git(Some(target_dir), &args, deadline)?;
    if !output.status.success() {
        return Err(clone_error(url, ref_name, &stderr_of(&output)));
    }

    let output = run_git(
        Some(target_dir),
        &["reset", "--hard", "--quiet", "FETCH_HEAD"],
        deadline,
    )?;
    if !output.status.success() {
        return Err(Error::Checkout {
            r#ref: ref_name.to_string(),
            message: stderr_of(&output),
        });
    }

    Ok(())
}

/// Lists the tag names of a local repository.
pub fn list_tags(repo_dir: &Path) -> Result<Vec<String>> {
    let output = run_local(repo_dir, &["for-each-ref", "--format=%(refname)", "refs/tags"])?;
    Ok(parse_tag_refs(&stdout_lines(&output)))
}

/// Strips `refs/tags/` from full reference names, dropping anything else.
pub fn parse_tag_refs(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| {
            // Accept both bare ref names and `<hash>\t<ref>` pairs
            let ref_name = line.rsplit('\t').next().unwrap_or(line);
            ref_name
                .strip_prefix(TAG_REF_PREFIX)
                .filter(|tag| !tag.ends_with("^{}"))
                .map(|tag| tag.to_string())
        })
        .collect()
}

/// Resolves `rev` to a commit hash, dereferencing annotated tags.
pub fn resolve_commit(repo_dir: &Path, rev: &str) -> Result<String> {
    let spec = format!("{}^{{commit}}", rev);
    let output = run_git(
        Some(repo_dir),
        &["rev-parse", "--verify", "--quiet", spec.as_str()],
        Deadline::none(),
    )?;

    match stdout_lines(&output).into_iter().next() {
        Some(commit) if output.status.success() => Ok(commit),
        _ => Err(Error::NoSuchRef {
            r#ref: rev.to_string(),
            message: "reference not found".to_string(),
        }),
    }
}

/// Lists objects whose name starts with `prefix` using git's own
/// abbreviated-name index.
///
/// Returns `Ok(None)` when git cannot answer (for example an unsupported
/// prefix length), so the caller can fall back to a full scan.
pub fn disambiguate_prefix(repo_dir: &Path, prefix: &str) -> Result<Option<Vec<String>>> {
    let arg = format!("--disambiguate={}", prefix);
    let output = run_git(Some(repo_dir), &["rev-parse", arg.as_str()], Deadline::none())?;
    if !output.status.success() {
        debug!(
            "git rev-parse --disambiguate failed in {}: {}",
            repo_dir.display(),
            stderr_of(&output)
        );
        return Ok(None);
    }
    Ok(Some(stdout_lines(&output)))
}

/// Lists every object name in the repository's object database.
pub fn list_objects(repo_dir: &Path) -> Result<Vec<String>> {
    let output = run_local(
        repo_dir,
        &[
            "cat-file",
            "--batch-all-objects",
            "--batch-check=%(objectname)",
        ],
    )?;
    Ok(stdout_lines(&output))
}

/// Discards working-tree changes and points HEAD at `commit`.
pub fn hard_reset(repo_dir: &Path, commit: &str) -> Result<()> {
    for args in [
        ["reset", "--hard", "--quiet", commit].as_slice(),
        ["clean", "-fdq"].as_slice(),
    ] {
        let output = run_git(Some(repo_dir), args, Deadline::none())?;
        if !output.status.success() {
            return Err(Error::Checkout {
                r#ref: commit.to_string(),
                message: stderr_of(&output),
            });
        }
    }
    Ok(())
}
