//! In-process object codec
//!
//! Encodes and decodes commit, tree, blob and tag bodies in git's object
//! format and computes their content ids, so replacements are written
//! without shelling out to a git binary.

mod commit;
mod tag;
mod tree;

use std::sync::OnceLock;
use thiserror::Error;

use crate::model::{Blob, Hash, Object, ObjectKind, RawObject};

pub use commit::{decode_commit, encode_commit, salvage_commit, SalvagedCommit};
pub use tag::{decode_tag, encode_tag};
pub use tree::{decode_tree, encode_tree};

/// Well-known id of the tree with no entries
pub const EMPTY_TREE_HEX: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

static EMPTY_TREE: OnceLock<Hash> = OnceLock::new();

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected end of {0} data")]
    Truncated(&'static str),
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),
    #[error("malformed header line: {0}")]
    InvalidHeader(String),
    #[error("malformed object id: {0}")]
    InvalidHash(String),
    #[error("malformed entry mode: {0}")]
    InvalidMode(String),
    #[error("malformed signature: {0}")]
    InvalidSignature(String),
    #[error("unknown object type: {0}")]
    UnknownKind(String),
    #[error("hashing failed: {0}")]
    Hash(#[from] git2::Error),
}

fn git_kind(kind: ObjectKind) -> git2::ObjectType {
    match kind {
        ObjectKind::Commit => git2::ObjectType::Commit,
        ObjectKind::Tree => git2::ObjectType::Tree,
        ObjectKind::Blob => git2::ObjectType::Blob,
        ObjectKind::Tag => git2::ObjectType::Tag,
    }
}

/// SHA-1 over `"<kind> <len>\0" + data`
pub fn object_id(kind: ObjectKind, data: &[u8]) -> Result<Hash, CodecError> {
    let oid = git2::Oid::hash_object(git_kind(kind), data)?;
    Hash::from_slice(oid.as_bytes()).ok_or_else(|| CodecError::InvalidHash(oid.to_string()))
}

/// Id of the canonical empty tree, computed on first use
pub fn empty_tree_id() -> Result<Hash, CodecError> {
    if let Some(hash) = EMPTY_TREE.get() {
        return Ok(*hash);
    }
    let hash = object_id(ObjectKind::Tree, &[])?;
    Ok(*EMPTY_TREE.get_or_init(|| hash))
}

pub fn encode(object: &Object) -> Vec<u8> {
    match object {
        Object::Commit(commit) => encode_commit(commit),
        Object::Tree(tree) => encode_tree(tree),
        Object::Blob(blob) => blob.data.clone(),
        Object::Tag(tag) => encode_tag(tag),
    }
}

pub fn decode(raw: &RawObject) -> Result<Object, CodecError> {
    Ok(match raw.kind {
        ObjectKind::Commit => Object::Commit(decode_commit(&raw.data)?),
        ObjectKind::Tree => Object::Tree(decode_tree(&raw.data)?),
        ObjectKind::Blob => Object::Blob(Blob { data: raw.data.clone() }),
        ObjectKind::Tag => Object::Tag(decode_tag(&raw.data)?),
    })
}

/// Encode and hash in one step
pub fn encode_with_id(object: &Object) -> Result<(Hash, Vec<u8>), CodecError> {
    let data = encode(object);
    let hash = object_id(object.kind(), &data)?;
    Ok((hash, data))
}

pub(crate) fn parse_hex(value: &[u8]) -> Result<Hash, CodecError> {
    let text = std::str::from_utf8(value)
        .map_err(|_| CodecError::InvalidHash(String::from_utf8_lossy(value).into_owned()))?;
    Hash::from_hex(text).map_err(|_| CodecError::InvalidHash(text.to_string()))
}
