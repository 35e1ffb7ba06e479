//! Integrity scanner
//!
//! Walks every reference and the commit graph behind it, classifying each
//! anomaly as an [`Issue`]. Output order follows the sorted reference list
//! and a depth-first walk, so identical stores give identical reports.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::model::{
    Commit, EntryKind, Hash, Issue, IssueKind, ObjectKind, RefKind, RefTarget, Reference, Subject,
};
use crate::repository::{Lookup, ObjectStore, Resolved, StoreError};

use super::progress::ProgressReporter;

/// Issues found by one scan plus what was looked at
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub issues: Vec<Issue>,
    pub references: usize,
    pub commits: usize,
    pub trees: usize,
    /// References as read at scan time; rewrite updates compare against these
    #[serde(skip)]
    pub observed: Vec<Reference>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.iter().filter(|i| i.kind == kind).count()
    }

    /// Commits the planner must replace, ascending and without duplicates
    pub fn bad_commits(&self, include_missing_tips: bool) -> Vec<Hash> {
        let mut bad: Vec<Hash> = self
            .issues
            .iter()
            .filter_map(|issue| match issue.kind {
                IssueKind::MissingTree | IssueKind::CorruptedTree | IssueKind::NullParent => issue.commit,
                IssueKind::MissingCommit if include_missing_tips => issue.object_hash(),
                _ => None,
            })
            .collect();
        bad.sort();
        bad.dedup();
        bad
    }
}

/// Result of checking a tree and everything below it
#[derive(Debug, Clone)]
enum TreeHealth {
    Unreadable(String),
    /// Trees in the closure carrying zero entries or unreadable subtrees
    Checked(Rc<Vec<Hash>>),
}

pub struct Scanner {
    deep: bool,
}

impl Scanner {
    /// `deep` checks every reachable subtree, not just root trees
    pub fn new(deep: bool) -> Self {
        Self { deep }
    }

    pub fn scan<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        progress: &dyn ProgressReporter,
    ) -> Result<ScanReport, StoreError> {
        let references = store.list_references()?;
        let has_branch = references.iter().any(|r| r.kind() == RefKind::Branch);

        let mut walk = Walk {
            store,
            deep: self.deep,
            report: ScanReport::default(),
            seen: FxHashSet::default(),
            visited: FxHashSet::default(),
            stack: Vec::new(),
            trees: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        };

        // Phase 1: references
        let pb = progress.start("Checking references", Some(references.len() as u64));
        for reference in &references {
            pb.inc(1);
            if reference.kind() == RefKind::Replace {
                continue;
            }
            walk.report.references += 1;

            match &reference.target {
                RefTarget::Symbolic(target) => {
                    if reference.kind() != RefKind::Head || !has_branch {
                        continue;
                    }
                    match store.resolve(reference)? {
                        // The branch is in the list and gets checked on its own
                        Resolved::Direct { .. } => {}
                        Resolved::Dangling { name } => walk.emit(Issue::reference(
                            IssueKind::NullReference,
                            &reference.name,
                            format!("points at missing reference {}", name),
                        )),
                        Resolved::Loop => walk.emit(Issue::reference(
                            IssueKind::NullReference,
                            &reference.name,
                            format!("symbolic chain through {} loops", target),
                        )),
                    }
                }
                RefTarget::Direct(hash) if hash.is_zero() => walk.emit(Issue::reference(
                    IssueKind::NullReference,
                    &reference.name,
                    "points at the zero hash",
                )),
                RefTarget::Direct(hash) => match store.peel_to_commit(hash) {
                    Lookup::Found((commit_hash, commit)) => walk.push(commit_hash, commit),
                    failure => walk.emit(Issue::object(
                        IssueKind::MissingCommit,
                        *hash,
                        None,
                        format!("{}: {}", reference.name, failure.failure()),
                    )),
                },
            }
        }
        pb.finish_with("");

        // Phase 2: commit graph
        let pb = progress.start("Walking commits", None);
        while let Some((hash, commit)) = walk.stack.pop() {
            pb.inc(1);
            walk.visit(hash, &commit);
        }
        pb.finish_with(&format!("{} commits checked", walk.report.commits));

        walk.report.trees = walk.trees.len();
        walk.report.observed = references;
        debug!(
            "scan: {} refs, {} commits, {} trees, {} issues",
            walk.report.references,
            walk.report.commits,
            walk.report.trees,
            walk.report.issues.len()
        );
        Ok(walk.report)
    }
}

struct Walk<'s, S: ObjectStore + ?Sized> {
    store: &'s S,
    deep: bool,
    report: ScanReport,
    seen: FxHashSet<(IssueKind, Subject, Option<Hash>)>,
    /// Commits that loaded fine and were queued
    visited: FxHashSet<Hash>,
    stack: Vec<(Hash, Commit)>,
    trees: FxHashMap<Hash, TreeHealth>,
    in_progress: FxHashSet<Hash>,
}

impl<S: ObjectStore + ?Sized> Walk<'_, S> {
    fn emit(&mut self, issue: Issue) {
        if self.seen.insert(issue.key()) {
            debug!("{}", issue);
            self.report.issues.push(issue);
        }
    }

    fn push(&mut self, hash: Hash, commit: Commit) {
        if self.visited.insert(hash) {
            self.stack.push((hash, commit));
        }
    }

    fn visit(&mut self, hash: Hash, commit: &Commit) {
        self.report.commits += 1;
        self.check_root_tree(hash, commit.tree);

        for parent in &commit.parents {
            if parent.is_zero() {
                self.emit(Issue::object(IssueKind::NullParent, *parent, Some(hash), "zero parent hash"));
                continue;
            }
            if self.visited.contains(parent) {
                continue;
            }
            match self.store.load_commit(parent) {
                Lookup::Found(parent_commit) => self.push(*parent, parent_commit),
                failure => self.emit(Issue::object(
                    IssueKind::NullParent,
                    *parent,
                    Some(hash),
                    format!("parent {}", failure.failure()),
                )),
            }
        }
    }

    fn check_root_tree(&mut self, commit: Hash, tree: Hash) {
        if tree.is_zero() {
            self.emit(Issue::object(IssueKind::MissingTree, tree, Some(commit), "zero tree hash"));
            return;
        }
        match self.tree_health(tree) {
            TreeHealth::Unreadable(detail) => {
                self.emit(Issue::object(IssueKind::MissingTree, tree, Some(commit), detail));
            }
            TreeHealth::Checked(bad) => {
                for bad_tree in bad.iter() {
                    let detail = if *bad_tree == tree {
                        "tree has zero-hash entries".to_string()
                    } else {
                        format!("subtree {} is damaged", bad_tree.short())
                    };
                    self.emit(Issue::object(IssueKind::CorruptedTree, *bad_tree, Some(commit), detail));
                }
            }
        }
    }

    fn tree_health(&mut self, hash: Hash) -> TreeHealth {
        if let Some(health) = self.trees.get(&hash) {
            return health.clone();
        }
        if !self.in_progress.insert(hash) {
            warn!("tree {} contains itself", hash.short());
            return TreeHealth::Checked(Rc::new(Vec::new()));
        }

        let health = match self.store.load_tree(&hash) {
            Lookup::Found(tree) => {
                let mut bad = Vec::new();
                if tree.null_entries().next().is_some() {
                    bad.push(hash);
                }
                if self.deep {
                    for entry in tree.entries.iter().filter(|e| !e.hash.is_zero()) {
                        // Gitlinks name commits in other repositories
                        if entry.kind() != EntryKind::Tree {
                            continue;
                        }
                        match self.tree_health(entry.hash) {
                            TreeHealth::Unreadable(detail) => {
                                debug!("subtree {} unreadable: {}", entry.hash.short(), detail);
                                bad.push(entry.hash);
                            }
                            TreeHealth::Checked(below) => bad.extend(below.iter().copied()),
                        }
                    }
                    bad.sort();
                    bad.dedup();
                }
                TreeHealth::Checked(Rc::new(bad))
            }
            Lookup::Missing => TreeHealth::Unreadable(format!("{} {} not found", ObjectKind::Tree, hash.short())),
            Lookup::Corrupt(detail) => TreeHealth::Unreadable(detail),
        };

        self.in_progress.remove(&hash);
        self.trees.insert(hash, health.clone());
        health
    }
}
