//! Tree sanitizer
//!
//! Turns a damaged tree into a valid one: zero-hash entries are dropped,
//! everything else keeps its order and mode. An unparseable tree, or one with
//! nothing left, becomes the canonical empty tree. Subtrees are not visited.

use crate::codec::{self, CodecError};
use crate::model::{Hash, ObjectKind, Tree};

/// What the sanitizer was given
#[derive(Debug, Clone, Copy)]
pub enum TreeInput<'a> {
    Bytes(&'a [u8]),
    /// The object is absent or could not be read at all
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    /// Empty when falling back to the empty tree
    pub tree: Tree,
    pub removed: usize,
    pub unparseable: bool,
}

impl Sanitized {
    pub fn is_empty_tree(&self) -> bool {
        self.tree.is_empty()
    }

    /// Anything differs from the input tree
    pub fn changed(&self) -> bool {
        self.unparseable || self.removed > 0
    }

    pub fn id(&self) -> Result<Hash, CodecError> {
        if self.tree.is_empty() {
            return codec::empty_tree_id();
        }
        codec::object_id(ObjectKind::Tree, &codec::encode_tree(&self.tree))
    }
}

pub fn sanitize(input: TreeInput<'_>) -> Sanitized {
    let parsed = match input {
        TreeInput::Bytes(data) => codec::decode_tree(data).ok(),
        TreeInput::Unreadable => None,
    };
    let Some(mut tree) = parsed else {
        return Sanitized {
            tree: Tree::empty(),
            removed: 0,
            unparseable: true,
        };
    };

    let before = tree.entries.len();
    tree.entries.retain(|entry| !entry.hash.is_zero());
    Sanitized {
        removed: before - tree.entries.len(),
        tree,
        unparseable: false,
    }
}
