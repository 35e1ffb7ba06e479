//! Object store accessor trait
//!
//! Decouples repair logic from where objects and references actually live,
//! so the scanner, planner and rewrite engine run unchanged against an
//! on-disk repository, an in-memory arena or a dry-run staging layer.

use thiserror::Error;

use crate::codec::{self, CodecError};
use crate::model::{Commit, Hash, Object, ObjectKind, RawObject, RefTarget, Reference, Tree};

/// Longest symbolic chain followed before it is treated as a loop
pub const MAX_SYMREF_DEPTH: usize = 8;

/// Tags pointing at tags are followed at most this deep
pub const MAX_PEEL_DEPTH: usize = 8;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Result of reading an object. Absence and damage are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Missing,
    Corrupt(String),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::Missing => Lookup::Missing,
            Lookup::Corrupt(detail) => Lookup::Corrupt(detail),
        }
    }

    /// Short human description of a failed lookup
    pub fn failure(&self) -> &str {
        match self {
            Lookup::Found(_) => "found",
            Lookup::Missing => "not found",
            Lookup::Corrupt(detail) => detail,
        }
    }
}

/// Outcome of a compare-and-swap reference update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefUpdate {
    Applied,
    /// The reference no longer holds the expected value; nothing was written
    Conflict { actual: Option<RefTarget> },
}

/// Where a reference ends up after following symbolic links
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// `name` is the last reference in the chain, the one holding `hash`
    Direct { name: String, hash: Hash },
    /// Chain ends at a reference that does not exist (e.g. unborn branch)
    Dangling { name: String },
    Loop,
}

pub trait ObjectStore {
    fn read_raw(&self, hash: &Hash) -> Lookup<RawObject>;

    /// Content-addressed write; storing identical bytes twice yields the same hash
    fn write_raw(&mut self, kind: ObjectKind, data: &[u8]) -> Result<Hash, StoreError>;

    /// All references sorted by name, `HEAD` included when present
    fn list_references(&self) -> Result<Vec<Reference>, StoreError>;

    /// Point `name` at `new` only if it still points at `expected`
    fn set_reference(&mut self, name: &str, new: Hash, expected: Hash) -> Result<RefUpdate, StoreError>;

    fn set_symbolic_reference(&mut self, name: &str, target: &str) -> Result<(), StoreError>;

    fn remove_reference(&mut self, name: &str) -> Result<(), StoreError>;

    fn find_reference(&self, name: &str) -> Result<Option<Reference>, StoreError> {
        Ok(self.list_references()?.into_iter().find(|r| r.name == name))
    }

    fn load(&self, hash: &Hash) -> Lookup<Object> {
        if hash.is_zero() {
            return Lookup::Missing;
        }
        match self.read_raw(hash) {
            Lookup::Found(raw) => match codec::decode(&raw) {
                Ok(object) => Lookup::Found(object),
                Err(e) => Lookup::Corrupt(format!("{} {}: {}", raw.kind, hash.short(), e)),
            },
            Lookup::Missing => Lookup::Missing,
            Lookup::Corrupt(detail) => Lookup::Corrupt(detail),
        }
    }

    fn load_commit(&self, hash: &Hash) -> Lookup<Commit> {
        match self.load(hash) {
            Lookup::Found(Object::Commit(commit)) => Lookup::Found(commit),
            Lookup::Found(other) => Lookup::Corrupt(format!("expected commit, found {}", other.kind())),
            Lookup::Missing => Lookup::Missing,
            Lookup::Corrupt(detail) => Lookup::Corrupt(detail),
        }
    }

    fn load_tree(&self, hash: &Hash) -> Lookup<Tree> {
        match self.load(hash) {
            Lookup::Found(Object::Tree(tree)) => Lookup::Found(tree),
            Lookup::Found(other) => Lookup::Corrupt(format!("expected tree, found {}", other.kind())),
            Lookup::Missing => Lookup::Missing,
            Lookup::Corrupt(detail) => Lookup::Corrupt(detail),
        }
    }

    fn store(&mut self, object: &Object) -> Result<Hash, StoreError> {
        let data = codec::encode(object);
        self.write_raw(object.kind(), &data)
    }

    /// Follow symbolic references to the one holding a hash
    fn resolve(&self, reference: &Reference) -> Result<Resolved, StoreError> {
        let mut current = reference.clone();
        for _ in 0..MAX_SYMREF_DEPTH {
            match current.target {
                RefTarget::Direct(hash) => {
                    return Ok(Resolved::Direct { name: current.name, hash });
                }
                RefTarget::Symbolic(target) => match self.find_reference(&target)? {
                    Some(next) => current = next,
                    None => return Ok(Resolved::Dangling { name: target }),
                },
            }
        }
        Ok(Resolved::Loop)
    }

    /// Load the commit a reference target names, following annotated tags
    fn peel_to_commit(&self, hash: &Hash) -> Lookup<(Hash, Commit)> {
        let mut current = *hash;
        for _ in 0..MAX_PEEL_DEPTH {
            match self.load(&current) {
                Lookup::Found(Object::Commit(commit)) => return Lookup::Found((current, commit)),
                Lookup::Found(Object::Tag(tag)) => current = tag.object,
                Lookup::Found(other) => {
                    return Lookup::Corrupt(format!("expected commit, found {}", other.kind()));
                }
                Lookup::Missing if current != *hash => {
                    return Lookup::Corrupt(format!("tag target {} not found", current.short()));
                }
                Lookup::Missing => return Lookup::Missing,
                Lookup::Corrupt(detail) => return Lookup::Corrupt(detail),
            }
        }
        Lookup::Corrupt("tag chain too deep".to_string())
    }
}
