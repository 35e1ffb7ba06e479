//! Replacement planner
//!
//! Builds a valid substitute for each bad commit and records it in the
//! overlay. Damaged trees are repaired bottom-up around the sanitizer; bad
//! parents are dropped; commits whose metadata cannot be read at all are
//! synthesized from the links that can be salvaged.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use tracing::debug;

use crate::codec;
use crate::config::RepairConfig;
use crate::model::{Commit, EntryKind, Hash, Object, ObjectKind, Signature, Tree};
use crate::repository::{Lookup, ObjectStore, StoreError};

use super::overlay::Overlay;
use super::sanitizer::{sanitize, TreeInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    /// Original metadata kept, tree and/or parents fixed
    Repaired,
    /// Original unreadable; minimal commit built under the tool identity
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Planned {
    pub original: Hash,
    pub replacement: Hash,
    pub kind: PlanKind,
    pub tree: Hash,
    pub dropped_parents: Vec<Hash>,
    pub removed_entries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TreeFix {
    Unchanged,
    Replaced(Hash),
    /// Nothing valid left; the parent drops the entry
    Emptied,
}

pub struct Planner<'c> {
    config: &'c RepairConfig,
    overlay: Overlay,
    planned: Vec<Planned>,
    trees: FxHashMap<Hash, TreeFix>,
    in_progress: FxHashSet<Hash>,
    removed_entries: usize,
    now: i64,
}

impl<'c> Planner<'c> {
    pub fn new(config: &'c RepairConfig) -> Self {
        let now = config
            .synthetic_timestamp
            .unwrap_or_else(|| time::OffsetDateTime::now_utc().unix_timestamp());
        Self {
            config,
            overlay: Overlay::new(),
            planned: Vec::new(),
            trees: FxHashMap::default(),
            in_progress: FxHashSet::default(),
            removed_entries: 0,
            now,
        }
    }

    pub fn planned(&self) -> &[Planned] {
        &self.planned
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Hand the overlay on to the rewrite phase
    pub fn finish(self) -> Overlay {
        self.overlay
    }

    /// Stage a replacement for `bad`. Returns `None` when there is nothing a
    /// commit could replace (the hash names a tag, tree or blob) or when the
    /// commit turns out to need no change.
    pub fn plan<S: ObjectStore + ?Sized>(
        &mut self,
        store: &mut S,
        bad: Hash,
    ) -> Result<Option<Hash>, StoreError> {
        if let Some(existing) = self.overlay.get(&bad) {
            return Ok(Some(existing));
        }
        self.removed_entries = 0;

        let (commit, kind, dropped) = match store.load_commit(&bad) {
            Lookup::Found(original) => {
                let (commit, dropped) = self.repaired(store, &original)?;
                if commit.tree == original.tree && commit.parents == original.parents {
                    return Ok(None);
                }
                (commit, PlanKind::Repaired, dropped)
            }
            failure => match self.synthesized(store, bad, &failure)? {
                Some((commit, dropped)) => (commit, PlanKind::Synthesized, dropped),
                None => return Ok(None),
            },
        };

        let replacement = store.store(&Object::Commit(commit.clone()))?;
        if replacement == bad {
            return Ok(None);
        }
        debug!("planned {} -> {} ({:?})", bad.short(), replacement.short(), kind);
        self.overlay.insert(bad, replacement);
        self.planned.push(Planned {
            original: bad,
            replacement,
            kind,
            tree: commit.tree,
            dropped_parents: dropped,
            removed_entries: self.removed_entries,
        });
        Ok(Some(replacement))
    }

    fn repaired<S: ObjectStore + ?Sized>(
        &mut self,
        store: &mut S,
        original: &Commit,
    ) -> Result<(Commit, Vec<Hash>), StoreError> {
        let mut commit = original.clone();
        commit.tree = self.repair_root_tree(store, original.tree)?;
        let (parents, dropped) = self.usable_parents(store, &original.parents);
        commit.parents = parents;
        commit.strip_signatures();
        Ok((commit, dropped))
    }

    fn synthesized<S: ObjectStore + ?Sized>(
        &mut self,
        store: &mut S,
        bad: Hash,
        failure: &Lookup<Commit>,
    ) -> Result<Option<(Commit, Vec<Hash>)>, StoreError> {
        let salvaged = match store.read_raw(&bad) {
            Lookup::Found(raw) if raw.kind == ObjectKind::Commit => codec::salvage_commit(&raw.data),
            Lookup::Found(raw) => {
                debug!("{} is a {}, not planning a commit for it", bad.short(), raw.kind);
                return Ok(None);
            }
            _ => Default::default(),
        };
        debug!("synthesizing {}: {}", bad.short(), failure.failure());

        let tree = match salvaged.tree {
            Some(tree) => self.repair_root_tree(store, tree)?,
            None => self.empty_tree(store)?,
        };
        let (parents, dropped) = self.usable_parents(store, &salvaged.parents);

        let identity = &self.config.identity;
        let signature = Signature::new(identity.name.clone(), identity.email.clone(), self.now);
        let commit = Commit {
            tree,
            parents,
            author: signature.clone(),
            committer: signature,
            extra_headers: Vec::new(),
            message: format!("Recovered commit {}: original metadata unreadable\n", bad).into_bytes(),
        };
        Ok(Some((commit, dropped)))
    }

    /// Keep parents that load as commits (or are already being replaced)
    fn usable_parents<S: ObjectStore + ?Sized>(&self, store: &S, parents: &[Hash]) -> (Vec<Hash>, Vec<Hash>) {
        let mut kept: Vec<Hash> = Vec::with_capacity(parents.len());
        let mut dropped = Vec::new();
        for parent in parents {
            let usable = !parent.is_zero()
                && (self.overlay.contains(parent) || store.load_commit(parent).is_found());
            if usable {
                if !kept.contains(parent) {
                    kept.push(*parent);
                }
            } else {
                dropped.push(*parent);
            }
        }
        (kept, dropped)
    }

    fn empty_tree<S: ObjectStore + ?Sized>(&self, store: &mut S) -> Result<Hash, StoreError> {
        store.store(&Object::Tree(Tree::empty()))
    }

    fn repair_root_tree<S: ObjectStore + ?Sized>(&mut self, store: &mut S, tree: Hash) -> Result<Hash, StoreError> {
        if tree.is_zero() {
            return self.empty_tree(store);
        }
        match self.repair_tree(store, tree)? {
            TreeFix::Unchanged => Ok(tree),
            TreeFix::Replaced(hash) => Ok(hash),
            TreeFix::Emptied => self.empty_tree(store),
        }
    }

    fn repair_tree<S: ObjectStore + ?Sized>(&mut self, store: &mut S, hash: Hash) -> Result<TreeFix, StoreError> {
        if let Some(fix) = self.trees.get(&hash) {
            return Ok(*fix);
        }
        if !self.in_progress.insert(hash) {
            return Ok(TreeFix::Unchanged);
        }

        let raw = store.read_raw(&hash);
        let input = match &raw {
            Lookup::Found(raw) if raw.kind == ObjectKind::Tree => TreeInput::Bytes(&raw.data),
            _ => TreeInput::Unreadable,
        };
        let sanitized = sanitize(input);
        self.removed_entries += sanitized.removed;
        let mut changed = sanitized.changed();
        let mut tree = sanitized.tree;

        if !sanitized.unparseable {
            let mut entries = Vec::with_capacity(tree.entries.len());
            for mut entry in tree.entries {
                if entry.kind() == EntryKind::Tree {
                    match self.repair_tree(store, entry.hash)? {
                        TreeFix::Unchanged => {}
                        TreeFix::Replaced(fixed) => {
                            entry.hash = fixed;
                            changed = true;
                        }
                        TreeFix::Emptied => {
                            self.removed_entries += 1;
                            changed = true;
                            continue;
                        }
                    }
                }
                entries.push(entry);
            }
            tree.entries = entries;
        }

        let fix = if !changed {
            TreeFix::Unchanged
        } else if tree.is_empty() {
            TreeFix::Emptied
        } else {
            TreeFix::Replaced(store.store(&Object::Tree(tree))?)
        };

        self.in_progress.remove(&hash);
        self.trees.insert(hash, fix);
        Ok(fix)
    }
}
