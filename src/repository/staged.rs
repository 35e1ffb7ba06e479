use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::codec;
use crate::model::{Hash, ObjectKind, RawObject, RefTarget, Reference};

use super::store::{Lookup, ObjectStore, RefUpdate, StoreError};

/// A reference change recorded by a staging layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedRefChange {
    pub name: String,
    pub before: Option<RefTarget>,
    /// `None` when the reference would be removed
    pub after: Option<RefTarget>,
}

/// Dry-run layer over a read-only store.
///
/// Writes are hashed in process and kept here; reads see staged objects
/// and reference changes first. The base store is only ever borrowed
/// shared, so nothing reaches it.
pub struct StagedStore<'a, S: ObjectStore + ?Sized> {
    base: &'a S,
    objects: FxHashMap<Hash, RawObject>,
    refs: BTreeMap<String, Option<RefTarget>>,
    changes: Vec<StagedRefChange>,
}

impl<'a, S: ObjectStore + ?Sized> StagedStore<'a, S> {
    pub fn new(base: &'a S) -> Self {
        Self {
            base,
            objects: FxHashMap::default(),
            refs: BTreeMap::new(),
            changes: Vec::new(),
        }
    }

    pub fn staged_object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn changes(&self) -> &[StagedRefChange] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<StagedRefChange> {
        self.changes
    }

    fn current(&self, name: &str) -> Result<Option<RefTarget>, StoreError> {
        match self.refs.get(name) {
            Some(staged) => Ok(staged.clone()),
            None => Ok(self.base.find_reference(name)?.map(|r| r.target)),
        }
    }

    fn stage(&mut self, name: &str, after: Option<RefTarget>) -> Result<(), StoreError> {
        let before = self.current(name)?;
        self.refs.insert(name.to_string(), after.clone());
        self.changes.push(StagedRefChange {
            name: name.to_string(),
            before,
            after,
        });
        Ok(())
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for StagedStore<'_, S> {
    fn read_raw(&self, hash: &Hash) -> Lookup<RawObject> {
        match self.objects.get(hash) {
            Some(raw) => Lookup::Found(raw.clone()),
            None => self.base.read_raw(hash),
        }
    }

    fn write_raw(&mut self, kind: ObjectKind, data: &[u8]) -> Result<Hash, StoreError> {
        let hash = codec::object_id(kind, data)?;
        self.objects
            .entry(hash)
            .or_insert_with(|| RawObject::new(kind, data.to_vec()));
        Ok(hash)
    }

    fn list_references(&self) -> Result<Vec<Reference>, StoreError> {
        let mut merged: BTreeMap<String, RefTarget> = self
            .base
            .list_references()?
            .into_iter()
            .map(|r| (r.name, r.target))
            .collect();
        for (name, staged) in &self.refs {
            match staged {
                Some(target) => merged.insert(name.clone(), target.clone()),
                None => merged.remove(name),
            };
        }
        Ok(merged
            .into_iter()
            .map(|(name, target)| Reference { name, target })
            .collect())
    }

    fn find_reference(&self, name: &str) -> Result<Option<Reference>, StoreError> {
        Ok(self.current(name)?.map(|target| Reference {
            name: name.to_string(),
            target,
        }))
    }

    fn set_reference(&mut self, name: &str, new: Hash, expected: Hash) -> Result<RefUpdate, StoreError> {
        let current = self.current(name)?;
        if current != Some(RefTarget::Direct(expected)) {
            return Ok(RefUpdate::Conflict { actual: current });
        }
        self.stage(name, Some(RefTarget::Direct(new)))?;
        Ok(RefUpdate::Applied)
    }

    fn set_symbolic_reference(&mut self, name: &str, target: &str) -> Result<(), StoreError> {
        self.stage(name, Some(RefTarget::Symbolic(target.to_string())))
    }

    fn remove_reference(&mut self, name: &str) -> Result<(), StoreError> {
        if self.current(name)?.is_some() {
            self.stage(name, None)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Blob, Object};
    use crate::repository::MemoryStore;

    #[test]
    fn test_staged_writes_never_reach_base() {
        let mut base = MemoryStore::new();
        let a = base.insert(&Object::Blob(Blob { data: b"a".to_vec() })).unwrap();
        base.insert_reference("refs/heads/main", RefTarget::Direct(a));
        let before = base.object_count();

        let mut staged = StagedStore::new(&base);
        let b = staged.store(&Object::Blob(Blob { data: b"b".to_vec() })).unwrap();
        assert!(staged.read_raw(&b).is_found());
        assert_eq!(
            staged.set_reference("refs/heads/main", b, a).unwrap(),
            RefUpdate::Applied
        );
        staged.remove_reference("refs/heads/gone").unwrap();

        let refs = staged.list_references().unwrap();
        assert_eq!(refs, vec![Reference::direct("refs/heads/main", b)]);
        assert_eq!(staged.changes().len(), 1);
        assert_eq!(staged.changes()[0].before, Some(RefTarget::Direct(a)));

        assert_eq!(base.object_count(), before);
        assert!(!base.contains(&b));
        assert_eq!(base.reference_target("refs/heads/main"), Some(&RefTarget::Direct(a)));
    }

    #[test]
    fn test_staged_removal_hides_reference() {
        let mut base = MemoryStore::new();
        base.insert_reference("refs/tags/v1", RefTarget::Direct(Hash::ZERO));
        let mut staged = StagedStore::new(&base);
        staged.remove_reference("refs/tags/v1").unwrap();
        assert!(staged.find_reference("refs/tags/v1").unwrap().is_none());
        assert!(staged.list_references().unwrap().is_empty());
        assert_eq!(staged.changes()[0].after, None);
    }
}
