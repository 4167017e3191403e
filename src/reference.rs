//! Git reference classification.
//!
//! A requested reference is either a (possibly abbreviated) commit hash or a
//! symbolic name. Symbolic names are tried as a branch first and as a tag
//! second; hashes are resolved against the objects of a full clone.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Error, Result};

/// Shortest abbreviated hash accepted as a commit reference.
pub const MIN_HASH_LEN: usize = 7;
/// Length of a full SHA-1 object name.
pub const FULL_HASH_LEN: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
    Commit,
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RefKind::Branch => "branch",
            RefKind::Tag => "tag",
            RefKind::Commit => "commit",
        })
    }
}

/// A reference together with the way it should be checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitReference {
    pub kind: RefKind,
    pub value: String,
}

impl GitReference {
    /// Classifies `value`: 7 to 40 hex digits is a commit hash, anything else
    /// is a symbolic name tried as a branch first.
    pub fn classify(value: &str) -> Self {
        let kind = if looks_like_hash(value) {
            RefKind::Commit
        } else {
            RefKind::Branch
        };

        Self {
            kind,
            value: value.to_string(),
        }
    }

    pub fn tag(value: &str) -> Self {
        Self {
            kind: RefKind::Tag,
            value: value.to_string(),
        }
    }

    /// The same name reinterpreted as a tag.
    pub fn as_tag(&self) -> Self {
        Self::tag(&self.value)
    }

    pub fn is_full_hash(&self) -> bool {
        self.kind == RefKind::Commit && self.value.len() == FULL_HASH_LEN
    }
}

impl fmt::Display for GitReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.value)
    }
}

fn looks_like_hash(value: &str) -> bool {
    (MIN_HASH_LEN..=FULL_HASH_LEN).contains(&value.len())
        && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Picks the single object whose name starts with `prefix`.
///
/// Matching is case-insensitive and duplicate object names count once. Zero
/// matches is "no matching hash", more than one is "ambiguous hash"; there
/// is never a silent pick.
pub fn match_hash_prefix<I, S>(prefix: &str, objects: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let prefix = prefix.to_ascii_lowercase();
    let matches: BTreeSet<String> = objects
        .into_iter()
        .map(|object| object.as_ref().trim().to_ascii_lowercase())
        .filter(|object| object.starts_with(&prefix))
        .collect();

    let mut iter = matches.into_iter();
    match (iter.next(), iter.next()) {
        (None, _) => Err(Error::NoSuchRef {
            r#ref: prefix,
            message: "no matching hash".to_string(),
        }),
        (Some(only), None) => Ok(only),
        (Some(first), Some(second)) => {
            let mut candidates = vec![first, second];
            candidates.extend(iter);
            Err(Error::AmbiguousRef {
                r#ref: prefix,
                candidates,
            })
        }
    }
}
