mod event;
mod hash;
mod issue;
mod object;
mod reference;

pub use event::{EventCategory, RepairEvent};
pub use hash::{Hash, HashParseError, HASH_LEN};
pub use issue::{Issue, IssueKind, Subject};
pub use object::{
    Blob, Commit, EntryKind, Object, ObjectKind, RawObject, Signature, Tag, Tree, TreeEntry,
    MODE_BLOB, MODE_EXECUTABLE, MODE_SUBMODULE, MODE_SYMLINK, MODE_TREE,
};
pub use reference::{RefKind, RefTarget, Reference, HEAD, REPLACE_PREFIX};
