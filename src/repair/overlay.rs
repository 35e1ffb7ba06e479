use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::Hash;

/// Mapping from original commit hashes to their replacements for one repair cycle.
///
/// Built by the planner, handed by value to the rewrite engine, which extends it
/// with every transitively rewritten commit and returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlay {
    map: BTreeMap<Hash, Hash>,
}

/// One overlay entry in report form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mapping {
    pub original: Hash,
    pub replacement: Hash,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, original: &Hash) -> Option<Hash> {
        self.map.get(original).copied()
    }

    pub fn contains(&self, original: &Hash) -> bool {
        self.map.contains_key(original)
    }

    /// Record `original -> replacement`; identity mappings are ignored
    pub fn insert(&mut self, original: Hash, replacement: Hash) -> Option<Hash> {
        if original == replacement {
            return None;
        }
        self.map.insert(original, replacement)
    }

    /// `hash` itself if it has no replacement
    pub fn substitute(&self, hash: Hash) -> Hash {
        self.get(&hash).unwrap_or(hash)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries in ascending order of original hash
    pub fn iter(&self) -> impl Iterator<Item = (Hash, Hash)> + '_ {
        self.map.iter().map(|(k, v)| (*k, *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Hash> {
        self.map.keys()
    }

    pub fn mappings(&self) -> Vec<Mapping> {
        self.iter()
            .map(|(original, replacement)| Mapping { original, replacement })
            .collect()
    }
}

impl FromIterator<(Hash, Hash)> for Overlay {
    fn from_iter<I: IntoIterator<Item = (Hash, Hash)>>(iter: I) -> Self {
        let mut overlay = Overlay::new();
        for (original, replacement) in iter {
            overlay.insert(original, replacement);
        }
        overlay
    }
}
