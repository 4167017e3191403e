//! # Template Source Parsing
//!
//! A template's source is a free-text, git-URL-like string. This module turns
//! it into a [`RepositoryDescriptor`] without touching the network or the
//! filesystem.
//!
//! ## Accepted Shapes
//!
//! ```text
//! [git::]https://host/namespace/name[.git][//subpath][?ref=X]
//! [git::]ssh://user@host/namespace/name[.git][//subpath][?ref=X]
//! user@host:namespace/name[.git][//subpath][?ref=X]
//! file:///abs/path/to/name[//subpath][?ref=X]
//! /abs/path/to/name[//subpath][?ref=X]
//! ```
//!
//! For http(s) and ssh the first two path segments are the namespace and the
//! repository name. For local repositories the last segment is the name and
//! everything before it is the namespace.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Prefix accepted in front of a source and stripped before parsing.
pub const GIT_PREFIX: &str = "git::";

/// Query parameter carrying the git reference.
pub const REF_PARAM: &str = "ref";

pub const DRIVER_GITHUB: &str = "github";
pub const DRIVER_GITLAB: &str = "gitlab";

const SUBPATH_SEPARATOR: &str = "//";
const GIT_SUFFIX: &str = ".git";

/// `user@host:path`, the scp-like syntax git accepts for ssh remotes.
static SCP_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:([^@/:]+)@)?([^@/:]+):([^/].*)$").expect("valid regex"));

/// Transport protocol of a repository link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
    Ssh,
    File,
}

impl Protocol {
    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            "ssh" | "git+ssh" | "ssh+git" => Some(Protocol::Ssh),
            "file" => Some(Protocol::File),
            _ => None,
        }
    }
}

/// A parsed template source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDescriptor {
    /// Owner or group of the repository; for local repositories the parent
    /// directory path.
    pub namespace: String,
    /// Repository name, without any `.git` suffix.
    pub name: String,
    /// Clone URL, without the `git::` prefix, the subpath and the `ref`
    /// parameter.
    pub link: String,
    /// Branch, tag or commit hash requested by the source, if any.
    pub reference: Option<String>,
    /// Directory inside the repository holding the template, if any.
    pub subpath: Option<String>,
    /// SCM driver inferred from the host (`github`, `gitlab`), empty when
    /// unknown.
    pub driver: String,
}

impl RepositoryDescriptor {
    /// Re-derives a fetchable source string pinned at `reference`.
    ///
    /// Parsing the result yields this descriptor with `reference` set.
    pub fn versioned_source(&self, reference: &str) -> String {
        let mut source = self.location();
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(REF_PARAM, reference)
            .finish()
            .replace('+', "%20");
        source.push('?');
        source.push_str(&query);
        source
    }

    /// The link plus subpath, without any reference.
    pub fn location(&self) -> String {
        match &self.subpath {
            Some(subpath) => format!("{}{}{}", self.link, SUBPATH_SEPARATOR, subpath),
            None => self.link.clone(),
        }
    }
}

impl fmt::Display for RepositoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Some(reference) => f.write_str(&self.versioned_source(reference)),
            None => f.write_str(&self.location()),
        }
    }
}

/// Parses a template source string into a [`RepositoryDescriptor`].
pub fn parse(source: &str) -> Result<RepositoryDescriptor> {
    let invalid = |message: &str| Error::SourceParse {
        source_str: source.to_string(),
        message: message.to_string(),
    };

    let trimmed = source.trim();
    let raw = trimmed.strip_prefix(GIT_PREFIX).unwrap_or(trimmed);
    if raw.is_empty() {
        return Err(invalid("source is empty"));
    }

    let (location, reference) = split_reference(raw);
    let endpoint = Endpoint::parse(location).map_err(|message| invalid(&message))?;

    let path = endpoint.path.trim_end_matches('/');
    let path = path.strip_suffix(GIT_SUFFIX).unwrap_or(path);
    let (namespace, name) = split_repository_path(endpoint.protocol, path)
        .ok_or_else(|| invalid("invalid repository path"))?;

    Ok(RepositoryDescriptor {
        namespace,
        name,
        link: endpoint.link,
        reference,
        subpath: endpoint.subpath,
        driver: driver_for_host(endpoint.host.as_deref()).to_string(),
    })
}

/// Splits off the query string and extracts the `ref` parameter from it.
///
/// Other query parameters are dropped: the link is handed to `git`, which has
/// no use for them. A literal `+` is kept as is, so build metadata in a semver
/// tag (`v1.0.0+build.1`) survives.
fn split_reference(raw: &str) -> (&str, Option<String>) {
    let Some((location, query)) = raw.split_once('?') else {
        return (raw, None);
    };

    let query = query.replace('+', "%2B");
    let reference = url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == REF_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .last();

    (location, reference)
}

/// The structured form of a repository location.
struct Endpoint {
    protocol: Protocol,
    host: Option<String>,
    path: String,
    link: String,
    subpath: Option<String>,
}

impl Endpoint {
    fn parse(location: &str) -> std::result::Result<Self, String> {
        if let Some((scheme, rest)) = location.split_once("://") {
            let protocol = Protocol::from_scheme(scheme)
                .ok_or_else(|| format!("unsupported scheme {:?}", scheme))?;
            let (base, subpath) = split_subpath(rest)?;
            let link = format!("{}://{}", scheme, base);
            let url = Url::parse(&link).map_err(|e| format!("malformed URL: {}", e))?;
            let host = url
                .host_str()
                .filter(|host| !host.is_empty())
                .map(str::to_string);
            if protocol != Protocol::File && host.is_none() {
                return Err("malformed URL: missing host".to_string());
            }

            return Ok(Self {
                protocol,
                host,
                path: url.path().to_string(),
                link,
                subpath,
            });
        }

        if location.starts_with('/') {
            let (base, subpath) = split_subpath(location)?;
            return Ok(Self {
                protocol: Protocol::File,
                host: None,
                path: base.to_string(),
                link: base.to_string(),
                subpath,
            });
        }

        if let Some(caps) = SCP_LIKE.captures(location) {
            let host = caps[2].to_string();
            let (path, subpath) = split_subpath(&caps[3])?;
            let link = match caps.get(1) {
                Some(user) => format!("{}@{}:{}", user.as_str(), host, path),
                None => format!("{}:{}", host, path),
            };

            return Ok(Self {
                protocol: Protocol::Ssh,
                host: Some(host),
                path: path.to_string(),
                link,
                subpath,
            });
        }

        Err("malformed URL: expected scheme://host/path".to_string())
    }
}

fn split_subpath(location: &str) -> std::result::Result<(&str, Option<String>), String> {
    let Some(index) = location.find(SUBPATH_SEPARATOR) else {
        return Ok((location, None));
    };

    let base = &location[..index];
    let subpath = location[index + SUBPATH_SEPARATOR.len()..].trim_matches('/');
    if subpath.split('/').any(|component| component == "..") {
        return Err("subpath must stay inside the repository".to_string());
    }

    Ok((base, (!subpath.is_empty()).then(|| subpath.to_string())))
}

fn split_repository_path(protocol: Protocol, path: &str) -> Option<(String, String)> {
    match protocol {
        Protocol::Http | Protocol::Https | Protocol::Ssh => {
            let mut segments = path.trim_start_matches('/').split('/');
            let namespace = segments.next().filter(|s| !s.is_empty())?;
            let name = segments.next().filter(|s| !s.is_empty())?;
            Some((namespace.to_string(), name.to_string()))
        }
        Protocol::File => {
            let (namespace, name) = path.rsplit_once('/')?;
            if name.is_empty() {
                return None;
            }
            Some((namespace.to_string(), name.to_string()))
        }
    }
}

fn driver_for_host(host: Option<&str>) -> &'static str {
    match host {
        Some("github.com") => DRIVER_GITHUB,
        Some("gitlab.com") => DRIVER_GITLAB,
        _ => "",
    }
}
