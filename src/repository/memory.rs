use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

use crate::codec;
use crate::model::{Hash, Object, ObjectKind, RawObject, RefTarget, Reference};

use super::store::{Lookup, ObjectStore, RefUpdate, StoreError};

/// Arena-style store: objects keyed by content hash, references in a sorted map.
///
/// Also the fault-injection harness for tests: objects can be planted under
/// keys that do not match their content, dropped, and writes can be made to
/// fail after a number of successes.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: FxHashMap<Hash, RawObject>,
    refs: BTreeMap<String, RefTarget>,
    corrupt: FxHashMap<Hash, String>,
    fail_writes_after: Option<usize>,
    writes: usize,
    ref_writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode and store an object, returning its hash
    pub fn insert(&mut self, object: &Object) -> Result<Hash, StoreError> {
        self.store(object)
    }

    /// Plant raw bytes under an arbitrary key
    pub fn insert_raw_at(&mut self, hash: Hash, kind: ObjectKind, data: impl Into<Vec<u8>>) {
        self.objects.insert(hash, RawObject::new(kind, data));
    }

    /// Make reads of `hash` fail as if the backing file were damaged
    pub fn mark_unreadable(&mut self, hash: Hash, detail: impl Into<String>) {
        self.corrupt.insert(hash, detail.into());
    }

    pub fn remove_object(&mut self, hash: &Hash) -> Option<RawObject> {
        self.objects.remove(hash)
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.objects.contains_key(hash)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Set a reference unconditionally (fixture setup, not counted as a write)
    pub fn insert_reference(&mut self, name: impl Into<String>, target: RefTarget) {
        self.refs.insert(name.into(), target);
    }

    pub fn reference_target(&self, name: &str) -> Option<&RefTarget> {
        self.refs.get(name)
    }

    pub fn fail_writes_after(&mut self, successes: usize) {
        self.fail_writes_after = Some(successes);
    }

    /// Successful object writes so far
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Reference mutations applied so far
    pub fn reference_write_count(&self) -> usize {
        self.ref_writes
    }
}

impl ObjectStore for MemoryStore {
    fn read_raw(&self, hash: &Hash) -> Lookup<RawObject> {
        if let Some(detail) = self.corrupt.get(hash) {
            return Lookup::Corrupt(detail.clone());
        }
        match self.objects.get(hash) {
            Some(raw) => Lookup::Found(raw.clone()),
            None => Lookup::Missing,
        }
    }

    fn write_raw(&mut self, kind: ObjectKind, data: &[u8]) -> Result<Hash, StoreError> {
        if self.fail_writes_after.is_some_and(|limit| self.writes >= limit) {
            return Err(StoreError::Rejected("injected write failure".to_string()));
        }
        let hash = codec::object_id(kind, data)?;
        self.objects
            .entry(hash)
            .or_insert_with(|| RawObject::new(kind, data.to_vec()));
        self.writes += 1;
        Ok(hash)
    }

    fn list_references(&self) -> Result<Vec<Reference>, StoreError> {
        Ok(self
            .refs
            .iter()
            .map(|(name, target)| Reference {
                name: name.clone(),
                target: target.clone(),
            })
            .collect())
    }

    fn find_reference(&self, name: &str) -> Result<Option<Reference>, StoreError> {
        Ok(self.refs.get(name).map(|target| Reference {
            name: name.to_string(),
            target: target.clone(),
        }))
    }

    fn set_reference(&mut self, name: &str, new: Hash, expected: Hash) -> Result<RefUpdate, StoreError> {
        match self.refs.get(name) {
            Some(RefTarget::Direct(current)) if *current == expected => {
                self.refs.insert(name.to_string(), RefTarget::Direct(new));
                self.ref_writes += 1;
                Ok(RefUpdate::Applied)
            }
            actual => Ok(RefUpdate::Conflict {
                actual: actual.cloned(),
            }),
        }
    }

    fn set_symbolic_reference(&mut self, name: &str, target: &str) -> Result<(), StoreError> {
        self.refs
            .insert(name.to_string(), RefTarget::Symbolic(target.to_string()));
        self.ref_writes += 1;
        Ok(())
    }

    fn remove_reference(&mut self, name: &str) -> Result<(), StoreError> {
        if self.refs.remove(name).is_some() {
            self.ref_writes += 1;
        }
        Ok(())
    }
}
