//! Reference repair
//!
//! Runs after the rewrite. Every reference that still names the zero hash,
//! or a hash that does not peel to a commit, is repointed according to the
//! configured [`FallbackPolicy`], deleted, or reported unrepairable. `HEAD`
//! is handled last and is never deleted.

use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::{FallbackPolicy, RepairConfig};
use crate::model::{Hash, RefKind, RefTarget, Reference, HEAD};
use crate::repository::{Lookup, ObjectStore, RefUpdate, Resolved, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceOutcome {
    /// Moved to the rewritten commit
    Updated,
    /// Moved to a fallback commit or branch
    Repointed,
    Deleted,
    /// Changed by someone else since it was read; left alone
    Conflict,
    /// No candidate to point at
    Unrepairable,
    /// Its history contains a parent cycle; left alone
    CycleDetected,
}

impl ReferenceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ReferenceOutcome::Conflict | ReferenceOutcome::Unrepairable | ReferenceOutcome::CycleDetected
        )
    }
}

impl fmt::Display for ReferenceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ReferenceOutcome::Updated => "updated",
            ReferenceOutcome::Repointed => "repointed",
            ReferenceOutcome::Deleted => "deleted",
            ReferenceOutcome::Conflict => "conflict",
            ReferenceOutcome::Unrepairable => "unrepairable",
            ReferenceOutcome::CycleDetected => "cycle-detected",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceChange {
    pub name: String,
    pub before: Option<RefTarget>,
    pub after: Option<RefTarget>,
    pub outcome: ReferenceOutcome,
    pub detail: String,
}

/// A valid branch tip a broken reference may be pointed at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub commit: Hash,
    pub committer_time: i64,
}

fn newest(candidates: &[Candidate]) -> Option<&Candidate> {
    // Latest committer time; on a tie the smallest name
    candidates.iter().max_by(|a, b| {
        a.committer_time
            .cmp(&b.committer_time)
            .then_with(|| b.name.cmp(&a.name))
    })
}

fn preferred<'a>(config: &RepairConfig, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    config
        .preferred_refs()
        .find_map(|name| candidates.iter().find(|c| c.name == name))
}

/// The commit a broken reference falls back to under `policy`
pub fn choose_fallback<'a>(config: &RepairConfig, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    match config.fallback {
        FallbackPolicy::NewestCommit => newest(candidates),
        FallbackPolicy::PreferredBranches => preferred(config, candidates).or_else(|| newest(candidates)),
        FallbackPolicy::None => None,
    }
}

/// The branch `HEAD` should follow: preferred names first, then the policy
fn choose_head_branch<'a>(config: &RepairConfig, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    preferred(config, candidates).or_else(|| choose_fallback(config, candidates))
}

fn healthy_commit<S: ObjectStore + ?Sized>(store: &S, hash: &Hash) -> Option<(Hash, i64)> {
    if hash.is_zero() {
        return None;
    }
    match store.peel_to_commit(hash) {
        Lookup::Found((commit_hash, commit)) => Some((commit_hash, commit.committer.time)),
        _ => None,
    }
}

/// Valid candidates among `refs` of the given kind, sorted by name
fn candidates_of<S: ObjectStore + ?Sized>(store: &S, refs: &[Reference], kind: RefKind) -> Vec<Candidate> {
    refs.iter()
        .filter(|r| r.kind() == kind)
        .filter_map(|r| {
            let (commit, committer_time) = healthy_commit(store, &r.direct_target()?)?;
            Some(Candidate {
                name: r.name.clone(),
                commit,
                committer_time,
            })
        })
        .collect()
}

pub fn repair_references<S: ObjectStore + ?Sized>(
    store: &mut S,
    config: &RepairConfig,
) -> Result<Vec<ReferenceChange>, StoreError> {
    let refs = store.list_references()?;
    let branches = candidates_of(store, &refs, RefKind::Branch);
    let fallback = choose_fallback(config, &branches).cloned();
    if let Some(choice) = &fallback {
        debug!("fallback target: {} at {}", choice.name, choice.commit.short());
    }

    let mut changes = Vec::new();
    for reference in &refs {
        if matches!(reference.kind(), RefKind::Head | RefKind::Replace) {
            continue;
        }
        let Some(current) = reference.direct_target() else {
            continue;
        };
        if healthy_commit(store, &current).is_some() {
            continue;
        }

        let before = Some(reference.target.clone());
        let change = match &fallback {
            Some(choice) => match store.set_reference(&reference.name, choice.commit, current)? {
                RefUpdate::Applied => {
                    info!("{} repointed to {} ({})", reference.name, choice.commit.short(), choice.name);
                    ReferenceChange {
                        name: reference.name.clone(),
                        before,
                        after: Some(RefTarget::Direct(choice.commit)),
                        outcome: ReferenceOutcome::Repointed,
                        detail: format!("fallback to {}", choice.name),
                    }
                }
                RefUpdate::Conflict { actual } => ReferenceChange {
                    name: reference.name.clone(),
                    before,
                    after: actual,
                    outcome: ReferenceOutcome::Conflict,
                    detail: "reference changed during repair".to_string(),
                },
            },
            None if config.delete_unrepairable_refs => {
                store.remove_reference(&reference.name)?;
                warn!("{} deleted: no valid commit to point at", reference.name);
                ReferenceChange {
                    name: reference.name.clone(),
                    before,
                    after: None,
                    outcome: ReferenceOutcome::Deleted,
                    detail: "no valid commit to point at".to_string(),
                }
            }
            None => ReferenceChange {
                name: reference.name.clone(),
                before,
                after: None,
                outcome: ReferenceOutcome::Unrepairable,
                detail: "no valid commit to point at".to_string(),
            },
        };
        changes.push(change);
    }

    if let Some(change) = repair_head(store, config)? {
        changes.push(change);
    }
    Ok(changes)
}

fn repair_head<S: ObjectStore + ?Sized>(store: &mut S, config: &RepairConfig) -> Result<Option<ReferenceChange>, StoreError> {
    let Some(head) = store.find_reference(HEAD)? else {
        return Ok(None);
    };
    let refs = store.list_references()?;
    let any_branch = refs.iter().any(|r| r.kind() == RefKind::Branch);

    let broken = match store.resolve(&head)? {
        Resolved::Direct { hash, .. } => healthy_commit(store, &hash).is_none(),
        // An unborn branch in a repository without any branch is a fresh repository
        Resolved::Dangling { .. } => any_branch,
        Resolved::Loop => true,
    };
    if !broken {
        return Ok(None);
    }

    let before = Some(head.target.clone());
    let branches = candidates_of(store, &refs, RefKind::Branch);
    if let Some(branch) = choose_head_branch(config, &branches) {
        store.set_symbolic_reference(HEAD, &branch.name)?;
        info!("HEAD now follows {}", branch.name);
        return Ok(Some(ReferenceChange {
            name: HEAD.to_string(),
            before,
            after: Some(RefTarget::Symbolic(branch.name.clone())),
            outcome: ReferenceOutcome::Repointed,
            detail: format!("attached to {}", branch.name),
        }));
    }

    // No valid branch: a detached HEAD moves to the best commit another reference offers
    let mut others = candidates_of(store, &refs, RefKind::Tag);
    others.extend(candidates_of(store, &refs, RefKind::Remote));
    others.extend(candidates_of(store, &refs, RefKind::Other));
    let detached = match config.fallback {
        FallbackPolicy::None => None,
        _ => newest(&others),
    };

    if let (Some(choice), RefTarget::Direct(current)) = (detached, &head.target) {
        return Ok(Some(match store.set_reference(HEAD, choice.commit, *current)? {
            RefUpdate::Applied => ReferenceChange {
                name: HEAD.to_string(),
                before,
                after: Some(RefTarget::Direct(choice.commit)),
                outcome: ReferenceOutcome::Repointed,
                detail: format!("detached at {}", choice.name),
            },
            RefUpdate::Conflict { actual } => ReferenceChange {
                name: HEAD.to_string(),
                before,
                after: actual,
                outcome: ReferenceOutcome::Conflict,
                detail: "HEAD changed during repair".to_string(),
            },
        }));
    }
    warn!("HEAD is broken and no valid reference remains");
    Ok(Some(ReferenceChange {
        name: HEAD.to_string(),
        before,
        after: None,
        outcome: ReferenceOutcome::Unrepairable,
        detail: "no valid branch or commit to point at".to_string(),
    }))
}
