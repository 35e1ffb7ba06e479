use serde::Serialize;
use std::fmt;

use super::Hash;

pub const HEAD: &str = "HEAD";
pub const REPLACE_PREFIX: &str = "refs/replace/";

/// Where a reference points
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "target")]
pub enum RefTarget {
    Direct(Hash),
    Symbolic(String),
}

impl fmt::Display for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefTarget::Direct(hash) => write!(f, "{}", hash),
            RefTarget::Symbolic(name) => write!(f, "ref: {}", name),
        }
    }
}

/// Reference namespace, derived from the full name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Head,
    Branch,
    Tag,
    Remote,
    /// `refs/replace/*` overlay entries left by other tools
    Replace,
    Other,
}

impl RefKind {
    pub fn of(name: &str) -> Self {
        if name == HEAD {
            RefKind::Head
        } else if name.starts_with("refs/heads/") {
            RefKind::Branch
        } else if name.starts_with("refs/tags/") {
            RefKind::Tag
        } else if name.starts_with("refs/remotes/") {
            RefKind::Remote
        } else if name.starts_with(REPLACE_PREFIX) {
            RefKind::Replace
        } else {
            RefKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub name: String,
    pub target: RefTarget,
}

impl Reference {
    pub fn direct(name: impl Into<String>, hash: Hash) -> Self {
        Self {
            name: name.into(),
            target: RefTarget::Direct(hash),
        }
    }

    pub fn symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: RefTarget::Symbolic(target.into()),
        }
    }

    pub fn kind(&self) -> RefKind {
        RefKind::of(&self.name)
    }

    pub fn direct_target(&self) -> Option<Hash> {
        match self.target {
            RefTarget::Direct(hash) => Some(hash),
            RefTarget::Symbolic(_) => None,
        }
    }

    /// Name without the `refs/heads/`, `refs/tags/` or `refs/remotes/` prefix
    pub fn short_name(&self) -> &str {
        ["refs/heads/", "refs/tags/", "refs/remotes/"]
            .iter()
            .find_map(|prefix| self.name.strip_prefix(prefix))
            .unwrap_or(&self.name)
    }
}
