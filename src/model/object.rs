use serde::Serialize;
use std::fmt;

use super::Hash;

/// The kinds of object a content-addressed store holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
            ObjectKind::Tag => "tag",
        }
    }

    pub fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"commit" => Some(ObjectKind::Commit),
            b"tree" => Some(ObjectKind::Tree),
            b"blob" => Some(ObjectKind::Blob),
            b"tag" => Some(ObjectKind::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Undecoded object bytes as they sit in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
}

impl RawObject {
    pub fn new(kind: ObjectKind, data: impl Into<Vec<u8>>) -> Self {
        Self { kind, data: data.into() }
    }
}

/// A decoded object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Commit(Commit),
    Tree(Tree),
    Blob(Blob),
    Tag(Tag),
}

impl Object {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Commit(_) => ObjectKind::Commit,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tag(_) => ObjectKind::Tag,
        }
    }
}

/// Author/committer/tagger line: `Name <email> <seconds> <±hhmm>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Raw bytes; legacy history may carry non-UTF-8 names under an `encoding` header
    pub name: Vec<u8>,
    pub email: Vec<u8>,
    pub time: i64,
    /// Timezone offset kept verbatim (e.g. `+0200`)
    pub offset: String,
    /// Line as read, when it differs from the canonical rendering of the fields;
    /// written back unchanged on encode
    pub verbatim: Option<Vec<u8>>,
}

impl Signature {
    pub fn new(name: impl Into<Vec<u8>>, email: impl Into<Vec<u8>>, time: i64) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time,
            offset: "+0000".to_string(),
            verbatim: None,
        }
    }
}

/// Extra commit headers whose content no longer verifies once a commit is re-encoded
const SIGNATURE_HEADERS: &[&str] = &["gpgsig", "gpgsig-sha256"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: Hash,
    pub parents: Vec<Hash>,
    pub author: Signature,
    pub committer: Signature,
    /// Headers after `committer` (encoding, mergetag, gpgsig, ...) in original order.
    /// Multi-line values are stored joined with '\n'.
    pub extra_headers: Vec<(String, Vec<u8>)>,
    pub message: Vec<u8>,
}

impl Commit {
    /// First line of the message, lossily decoded
    pub fn summary(&self) -> String {
        let first = self.message.split(|&b| b == b'\n').next().unwrap_or_default();
        String::from_utf8_lossy(first).into_owned()
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Drop signature headers; returns true if any were present
    pub fn strip_signatures(&mut self) -> bool {
        let before = self.extra_headers.len();
        self.extra_headers
            .retain(|(key, _)| !SIGNATURE_HEADERS.contains(&key.as_str()));
        before != self.extra_headers.len()
    }
}

/// What a tree entry points at, derived from its mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Blob,
    Tree,
    /// Gitlink: a commit in another repository, never resolved locally
    Submodule,
}

pub const MODE_TREE: u32 = 0o040000;
pub const MODE_BLOB: u32 = 0o100644;
pub const MODE_EXECUTABLE: u32 = 0o100755;
pub const MODE_SYMLINK: u32 = 0o120000;
pub const MODE_SUBMODULE: u32 = 0o160000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: u32,
    /// File names are bytes; they need not be UTF-8
    pub name: Vec<u8>,
    pub hash: Hash,
}

impl TreeEntry {
    pub fn new(mode: u32, name: impl Into<Vec<u8>>, hash: Hash) -> Self {
        Self {
            mode,
            name: name.into(),
            hash,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self.mode & 0o170000 {
            0o040000 => EntryKind::Tree,
            0o160000 => EntryKind::Submodule,
            _ => EntryKind::Blob,
        }
    }

    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new(entries: Vec<TreeEntry>) -> Self {
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose hash is the null sentinel
    pub fn null_entries(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| e.hash.is_zero())
    }

    pub fn subtrees(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| e.kind() == EntryKind::Tree)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Blob {
    pub data: Vec<u8>,
}

/// Annotated tag object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub object: Hash,
    pub target_kind: ObjectKind,
    pub name: String,
    pub tagger: Option<Signature>,
    pub message: Vec<u8>,
}

const TAG_SIGNATURE_MARKERS: &[&[u8]] = &[
    b"-----BEGIN PGP SIGNATURE-----",
    b"-----BEGIN SSH SIGNATURE-----",
];

impl Tag {
    /// Cut an inline signature off the message; returns true if one was found
    pub fn strip_signature(&mut self) -> bool {
        let cut = TAG_SIGNATURE_MARKERS
            .iter()
            .filter_map(|marker| {
                self.message
                    .windows(marker.len())
                    .position(|w| w == *marker)
            })
            .min();
        match cut {
            Some(pos) => {
                self.message.truncate(pos);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_from_mode() {
        let h = Hash::from_bytes([1; 20]);
        assert_eq!(TreeEntry::new(MODE_TREE, "src", h).kind(), EntryKind::Tree);
        assert_eq!(TreeEntry::new(MODE_BLOB, "a.txt", h).kind(), EntryKind::Blob);
        assert_eq!(TreeEntry::new(MODE_EXECUTABLE, "run", h).kind(), EntryKind::Blob);
        assert_eq!(TreeEntry::new(MODE_SYMLINK, "link", h).kind(), EntryKind::Blob);
        assert_eq!(TreeEntry::new(MODE_SUBMODULE, "vendor", h).kind(), EntryKind::Submodule);
    }

    #[test]
    fn test_strip_commit_signatures() {
        let sig = Signature::new("A", "a@example.com", 1);
        let mut commit = Commit {
            tree: Hash::ZERO,
            parents: vec![],
            author: sig.clone(),
            committer: sig,
            extra_headers: vec![
                ("encoding".to_string(), b"ISO-8859-1".to_vec()),
                ("gpgsig".to_string(), b"-----BEGIN PGP SIGNATURE-----".to_vec()),
            ],
            message: b"subject\n\nbody\n".to_vec(),
        };
        assert!(commit.strip_signatures());
        assert_eq!(commit.extra_headers.len(), 1);
        assert_eq!(commit.extra_headers[0].0, "encoding");
        assert!(!commit.strip_signatures());
        assert_eq!(commit.summary(), "subject");
    }

    #[test]
    fn test_strip_tag_signature() {
        let mut tag = Tag {
            object: Hash::from_bytes([2; 20]),
            target_kind: ObjectKind::Commit,
            name: "v1.0".to_string(),
            tagger: None,
            message: b"release\n-----BEGIN PGP SIGNATURE-----\nabc\n".to_vec(),
        };
        assert!(tag.strip_signature());
        assert_eq!(tag.message, b"release\n");
    }
}
