use serde::Serialize;
use std::fmt;

use super::Hash;

/// Classification of a structural anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// A reference resolves to the zero hash (or its symbolic chain is broken)
    NullReference,
    /// A reference names a hash that does not load as a commit
    MissingCommit,
    /// A commit's tree is zero, absent or unreadable
    MissingTree,
    /// A parent hash is zero or does not load as a commit
    NullParent,
    /// A reachable tree holds a zero-hash entry or cannot be parsed
    CorruptedTree,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::NullReference => "null-reference",
            IssueKind::MissingCommit => "missing-commit",
            IssueKind::MissingTree => "missing-tree",
            IssueKind::NullParent => "null-parent",
            IssueKind::CorruptedTree => "corrupted-tree",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an issue is about: a named reference or an object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "id")]
pub enum Subject {
    Reference(String),
    Object(Hash),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Reference(name) => f.write_str(name),
            Subject::Object(hash) => write!(f, "{}", hash),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub subject: Subject,
    pub detail: String,
    /// Commit whose content carries the bad link, when there is one
    pub commit: Option<Hash>,
}

impl Issue {
    pub fn reference(kind: IssueKind, name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: Subject::Reference(name.into()),
            detail: detail.into(),
            commit: None,
        }
    }

    pub fn object(kind: IssueKind, hash: Hash, commit: Option<Hash>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: Subject::Object(hash),
            detail: detail.into(),
            commit,
        }
    }

    /// Identity used to drop duplicate findings
    pub fn key(&self) -> (IssueKind, Subject, Option<Hash>) {
        (self.kind, self.subject.clone(), self.commit)
    }

    pub fn reference_name(&self) -> Option<&str> {
        match &self.subject {
            Subject::Reference(name) => Some(name),
            Subject::Object(_) => None,
        }
    }

    pub fn object_hash(&self) -> Option<Hash> {
        match self.subject {
            Subject::Object(hash) => Some(hash),
            Subject::Reference(_) => None,
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.subject, self.detail)?;
        if let Some(commit) = self.commit {
            write!(f, " (in commit {})", commit.short())?;
        }
        Ok(())
    }
}
