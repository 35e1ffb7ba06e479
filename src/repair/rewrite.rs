//! History rewrite engine
//!
//! Propagates the overlay through every commit reachable from the
//! references: a commit whose parent changed is re-encoded with the new
//! parent hash, parents strictly before children. Reference updates run
//! last, after every object write has succeeded, and compare against the
//! targets the scan saw.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::{debug, warn};

use crate::model::{Commit, Hash, Object, RefKind, RefTarget, Reference, Tag};
use crate::repository::{Lookup, ObjectStore, RefUpdate, StoreError, MAX_PEEL_DEPTH};

use super::overlay::Overlay;
use super::progress::ProgressReporter;
use super::references::{ReferenceChange, ReferenceOutcome};

#[derive(Debug, Default)]
pub struct RewriteOutcome {
    /// Planner entries plus every transitively rewritten commit
    pub overlay: Overlay,
    /// Commits re-encoded by this pass, in processing order
    pub rewritten: Vec<(Hash, Hash)>,
    /// Annotated tags re-encoded to follow their commit
    pub retagged: Vec<(Hash, Hash)>,
    pub references: Vec<ReferenceChange>,
    /// Commits on or below a parent cycle, never rewritten
    pub cyclic: Vec<Hash>,
}

/// A direct reference and the commit it peels to
struct Tip {
    name: String,
    target: Hash,
    commit: Hash,
}

struct Node {
    /// Content to re-encode: the staged replacement for overlay keys,
    /// the original commit otherwise
    base: Commit,
    parents: Vec<Hash>,
}

pub fn rewrite<S: ObjectStore + ?Sized>(
    store: &mut S,
    overlay: Overlay,
    observed: &[Reference],
    progress: &dyn ProgressReporter,
) -> Result<RewriteOutcome, StoreError> {
    let mut outcome = RewriteOutcome {
        overlay,
        ..Default::default()
    };

    // Phase 1: tips of every direct, non-replacement reference
    let mut tips = Vec::new();
    for reference in observed {
        if reference.kind() == RefKind::Replace {
            continue;
        }
        let RefTarget::Direct(target) = reference.target else {
            continue;
        };
        if target.is_zero() {
            continue;
        }
        let commit = match store.peel_to_commit(&target) {
            Lookup::Found((commit, _)) => commit,
            _ if outcome.overlay.contains(&target) => target,
            _ => continue,
        };
        tips.push(Tip {
            name: reference.name.clone(),
            target,
            commit,
        });
    }

    // Phase 2: reachable graph, seen through the overlay
    let nodes = collect_graph(store, &outcome.overlay, &tips);

    // Phase 3: Kahn's algorithm, smallest hash first among ready commits
    let mut pending: FxHashMap<Hash, usize> = FxHashMap::default();
    let mut children: FxHashMap<Hash, Vec<Hash>> = FxHashMap::default();
    for (hash, node) in &nodes {
        let inside: Vec<Hash> = node
            .parents
            .iter()
            .copied()
            .filter(|p| nodes.contains_key(p))
            .collect();
        pending.insert(*hash, inside.len());
        for parent in inside {
            children.entry(parent).or_default().push(*hash);
        }
    }
    let mut ready: BinaryHeap<Reverse<Hash>> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(hash, _)| Reverse(*hash))
        .collect();

    let pb = progress.start("Rewriting", Some(nodes.len() as u64));
    while let Some(Reverse(hash)) = ready.pop() {
        pb.inc(1);
        pending.remove(&hash);
        if let Some(node) = nodes.get(&hash) {
            propagate(store, &mut outcome, hash, node)?;
        }
        for child in children.get(&hash).into_iter().flatten() {
            if let Some(count) = pending.get_mut(child) {
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse(*child));
                }
            }
        }
    }
    pb.finish_with("");

    let cyclic: FxHashSet<Hash> = pending.keys().copied().collect();
    if !cyclic.is_empty() {
        warn!("{} commits lie on or below a parent cycle", cyclic.len());
    }
    outcome.cyclic = cyclic.iter().copied().collect();
    outcome.cyclic.sort();

    // Phase 4: annotated tags, then references
    let mut tag_memo: FxHashMap<Hash, Option<Hash>> = FxHashMap::default();
    let mut updates = Vec::new();
    for tip in &tips {
        if cyclic.contains(&tip.commit) {
            outcome.references.push(ReferenceChange {
                name: tip.name.clone(),
                before: Some(RefTarget::Direct(tip.target)),
                after: None,
                outcome: ReferenceOutcome::CycleDetected,
                detail: format!("commit {} is part of a parent cycle", tip.commit.short()),
            });
            continue;
        }
        let new_target = if tip.target == tip.commit {
            outcome.overlay.get(&tip.commit)
        } else {
            retarget_tag(store, &mut outcome, &mut tag_memo, tip.target, 0)?
        };
        if let Some(new_target) = new_target {
            updates.push((tip, new_target));
        }
    }

    for (tip, new_target) in updates {
        let change = match store.set_reference(&tip.name, new_target, tip.target)? {
            RefUpdate::Applied => ReferenceChange {
                name: tip.name.clone(),
                before: Some(RefTarget::Direct(tip.target)),
                after: Some(RefTarget::Direct(new_target)),
                outcome: ReferenceOutcome::Updated,
                detail: String::new(),
            },
            RefUpdate::Conflict { actual } => {
                warn!("{} moved during repair, left untouched", tip.name);
                ReferenceChange {
                    name: tip.name.clone(),
                    before: Some(RefTarget::Direct(tip.target)),
                    after: actual,
                    outcome: ReferenceOutcome::Conflict,
                    detail: format!("expected {}, reference changed", tip.target.short()),
                }
            }
        };
        outcome.references.push(change);
    }

    Ok(outcome)
}

fn collect_graph<S: ObjectStore + ?Sized>(store: &S, overlay: &Overlay, tips: &[Tip]) -> FxHashMap<Hash, Node> {
    let mut nodes: FxHashMap<Hash, Node> = FxHashMap::default();
    let mut stack: Vec<Hash> = tips.iter().map(|t| t.commit).collect();

    while let Some(hash) = stack.pop() {
        if nodes.contains_key(&hash) {
            continue;
        }
        let source = overlay.get(&hash).unwrap_or(hash);
        let base = match store.load_commit(&source) {
            Lookup::Found(commit) => commit,
            failure => {
                debug!("rewrite skips {}: {}", source.short(), failure.failure());
                continue;
            }
        };

        let mut parents: Vec<Hash> = Vec::with_capacity(base.parents.len());
        for parent in &base.parents {
            if parents.contains(parent) {
                continue;
            }
            if overlay.contains(parent) || store.load_commit(parent).is_found() {
                parents.push(*parent);
                stack.push(*parent);
            }
        }
        nodes.insert(hash, Node { base, parents });
    }
    nodes
}

/// Re-encode `hash` if any of its parents now maps elsewhere
fn propagate<S: ObjectStore + ?Sized>(
    store: &mut S,
    outcome: &mut RewriteOutcome,
    hash: Hash,
    node: &Node,
) -> Result<(), StoreError> {
    if !node.parents.iter().any(|p| outcome.overlay.contains(p)) {
        return Ok(());
    }

    let mut commit = node.base.clone();
    commit.parents = node
        .base
        .parents
        .iter()
        .map(|p| outcome.overlay.substitute(*p))
        .collect();
    if commit.parents == node.base.parents {
        return Ok(());
    }
    commit.strip_signatures();

    let new_hash = store.store(&Object::Commit(commit))?;
    debug!("rewrote {} -> {}", hash.short(), new_hash.short());
    outcome.overlay.insert(hash, new_hash);
    outcome.rewritten.push((hash, new_hash));
    Ok(())
}

/// New tag object for a tag whose (possibly nested) target changed
fn retarget_tag<S: ObjectStore + ?Sized>(
    store: &mut S,
    outcome: &mut RewriteOutcome,
    memo: &mut FxHashMap<Hash, Option<Hash>>,
    hash: Hash,
    depth: usize,
) -> Result<Option<Hash>, StoreError> {
    if let Some(done) = memo.get(&hash) {
        return Ok(*done);
    }
    if depth >= MAX_PEEL_DEPTH {
        return Ok(None);
    }

    let new_target = match store.load(&hash) {
        Lookup::Found(Object::Tag(tag)) => {
            let inner = match store.load(&tag.object) {
                Lookup::Found(Object::Tag(_)) => retarget_tag(store, outcome, memo, tag.object, depth + 1)?,
                _ => outcome.overlay.get(&tag.object),
            };
            match inner {
                Some(object) => {
                    let mut tag: Tag = tag;
                    tag.object = object;
                    tag.strip_signature();
                    let new_hash = store.store(&Object::Tag(tag))?;
                    outcome.retagged.push((hash, new_hash));
                    Some(new_hash)
                }
                None => None,
            }
        }
        _ => None,
    };
    memo.insert(hash, new_target);
    Ok(new_target)
}
