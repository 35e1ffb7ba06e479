//! Repair core
//!
//! # Architecture
//!
//! - **scanner**: classifies anomalies reachable from the references
//! - **sanitizer**: turns one damaged tree into a valid one
//! - **planner**: builds replacement commits and the overlay
//! - **overlay**: original -> replacement mapping for one cycle
//! - **rewrite**: propagates the overlay through history, moves references
//! - **references**: repoints or removes references that are still broken
//! - **events**: structured event sinks
//! - **progress**: progress reporting abstraction
//!
//! [`Repairer`] runs scan, plan, rewrite and rescan until the graph is
//! clean or the round limit is hit, then repairs leftover references and
//! scans one last time to report what remains.

mod events;
mod overlay;
mod planner;
mod progress;
mod references;
mod rewrite;
mod sanitizer;
mod scanner;

pub use events::{EventLog, EventSink, NoopSink, TracingSink};
pub use overlay::{Mapping, Overlay};
pub use planner::{PlanKind, Planned, Planner};
pub use progress::{NoopProgress, PhaseRecord, Progress, ProgressHandle, ProgressReporter, RecordingProgress};
pub use references::{choose_fallback, repair_references, Candidate, ReferenceChange, ReferenceOutcome};
pub use rewrite::{rewrite, RewriteOutcome};
pub use sanitizer::{sanitize, Sanitized, TreeInput};
pub use scanner::{ScanReport, Scanner};

use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::info;

use crate::config::{MissingTipPolicy, RepairConfig};
use crate::model::{EventCategory, Issue, RefTarget, RepairEvent};
use crate::repository::{ObjectStore, Relocation, StagedRefChange, StagedStore, StoreError};

#[derive(Debug, Error)]
pub enum RepairError {
    /// Writing failed; no reference was moved past this point
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

/// Everything one run found and did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairReport {
    pub dry_run: bool,
    /// Scan/plan/rewrite cycles executed
    pub rounds: usize,
    pub initial: ScanReport,
    pub planned: Vec<Planned>,
    pub rewritten: Vec<Mapping>,
    pub retagged: Vec<Mapping>,
    /// Every original -> replacement mapping of the run, sorted by original
    pub overlay: Vec<Mapping>,
    pub references: Vec<ReferenceChange>,
    /// Issues still present in the confirming scan
    pub remaining: Vec<Issue>,
    /// Reference changes a dry run would make
    pub staged: Vec<StagedRefChange>,
    pub packed_refs_removed: usize,
    /// Loose objects found under the wrong path, moved before scanning
    pub relocated: Vec<Relocation>,
}

impl RepairReport {
    pub fn is_clean(&self) -> bool {
        self.remaining.is_empty() && !self.references.iter().any(|r| r.outcome.is_failure())
    }

    pub fn failed_references(&self) -> impl Iterator<Item = &ReferenceChange> {
        self.references.iter().filter(|r| r.outcome.is_failure())
    }
}

fn target_text(target: &Option<RefTarget>) -> Option<String> {
    target.as_ref().map(|t| t.to_string())
}

fn issue_event(issue: &Issue) -> RepairEvent {
    let mut event = RepairEvent::new(EventCategory::Issue, issue.subject.to_string())
        .detail(format!("{}: {}", issue.kind, issue.detail))
        .failed();
    event.before = issue.commit.map(|c| c.to_string());
    event
}

fn reference_event(change: &ReferenceChange) -> RepairEvent {
    let mut event = RepairEvent::new(EventCategory::Reference, &change.name)
        .detail(if change.detail.is_empty() {
            change.outcome.to_string()
        } else {
            format!("{}: {}", change.outcome, change.detail)
        });
    event.before = target_text(&change.before);
    event.after = target_text(&change.after);
    if change.outcome.is_failure() {
        event = event.failed();
    }
    event
}

/// Orchestrates the full repair cycle
pub struct Repairer {
    config: RepairConfig,
    verbose: bool,
    profile: bool,
}

impl Repairer {
    pub fn new(config: RepairConfig) -> Self {
        Self {
            config,
            verbose: true,
            profile: false,
        }
    }

    /// No progress bars or phase logging (tests, benchmarks, JSON output)
    pub fn quiet(config: RepairConfig) -> Self {
        Self {
            config,
            verbose: false,
            profile: false,
        }
    }

    /// Log the elapsed time of every phase
    pub fn profiling(config: RepairConfig) -> Self {
        Self {
            config,
            verbose: true,
            profile: true,
        }
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    fn log(&self, message: impl AsRef<str>) {
        if self.verbose {
            info!("{}", message.as_ref());
        }
    }

    fn profile_phase(&self, name: &str, start: Instant) {
        if self.profile {
            info!("[PROFILE] {}: {:?}", name, start.elapsed());
        }
    }

    fn progress(&self) -> Progress {
        if self.verbose && !self.profile {
            Progress::Terminal
        } else {
            Progress::Hidden
        }
    }

    fn scanner(&self) -> Scanner {
        Scanner::new(self.config.deep_tree_scan)
    }

    /// Scan only
    pub fn diagnose<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<ScanReport, RepairError> {
        let start = Instant::now();
        let report = self.scanner().scan(store, &self.progress())?;
        self.profile_phase("Scan", start);
        Ok(report)
    }

    /// Live run: writes objects, then moves references
    pub fn repair<S: ObjectStore + ?Sized>(
        &self,
        store: &mut S,
        sink: &mut dyn EventSink,
    ) -> Result<RepairReport, RepairError> {
        self.run(store, sink, false)
    }

    /// Dry run over the same code path; `store` is only read
    pub fn preview<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        sink: &mut dyn EventSink,
    ) -> Result<RepairReport, RepairError> {
        let mut staged = StagedStore::new(store);
        let mut report = self.run(&mut staged, sink, true)?;
        report.staged = staged.into_changes();
        Ok(report)
    }

    fn run<S: ObjectStore + ?Sized>(
        &self,
        store: &mut S,
        sink: &mut dyn EventSink,
        dry_run: bool,
    ) -> Result<RepairReport, RepairError> {
        let total_start = Instant::now();
        let scanner = self.scanner();
        let progress = self.progress();
        let include_tips = self.config.missing_tip == MissingTipPolicy::Synthesize;

        // Phase 1: initial scan
        let phase_start = Instant::now();
        let initial = scanner.scan(store, &progress)?;
        self.profile_phase("Initial scan", phase_start);
        self.log(format!(
            "Scanned {} references, {} commits, {} trees: {} issues",
            initial.references,
            initial.commits,
            initial.trees,
            initial.issues.len()
        ));
        for issue in &initial.issues {
            sink.record(issue_event(issue));
        }

        let mut report = RepairReport {
            dry_run,
            initial: initial.clone(),
            ..Default::default()
        };
        let mut combined = Overlay::new();
        let mut scan = initial;

        while report.rounds < self.config.max_rounds.max(1) {
            let bad = scan.bad_commits(include_tips);
            if bad.is_empty() {
                break;
            }
            report.rounds += 1;

            // Phase 2: plan replacements
            let phase_start = Instant::now();
            let mut planner = Planner::new(&self.config);
            for hash in &bad {
                planner.plan(store, *hash)?;
            }
            for planned in planner.planned() {
                sink.record(
                    RepairEvent::new(EventCategory::Replacement, planned.original.to_string())
                        .before(planned.original)
                        .after(planned.replacement)
                        .detail(format!(
                            "{:?}: {} parents dropped, {} tree entries removed",
                            planned.kind,
                            planned.dropped_parents.len(),
                            planned.removed_entries
                        )),
                );
            }
            report.planned.extend(planner.planned().iter().cloned());
            let overlay = planner.finish();
            self.profile_phase("Plan", phase_start);
            self.log(format!("Round {}: {} of {} bad commits replaced", report.rounds, overlay.len(), bad.len()));
            if overlay.is_empty() {
                break;
            }

            // Phase 3: propagate through history
            let phase_start = Instant::now();
            let outcome = rewrite(store, overlay, &scan.observed, &progress)?;
            self.profile_phase("Rewrite", phase_start);
            self.log(format!(
                "Round {}: {} commits rewritten, {} references moved",
                report.rounds,
                outcome.rewritten.len(),
                outcome.references.len()
            ));
            for (original, replacement) in outcome.rewritten.iter().chain(&outcome.retagged) {
                sink.record(
                    RepairEvent::new(EventCategory::Rewrite, original.to_string())
                        .before(original)
                        .after(replacement),
                );
            }
            for change in &outcome.references {
                sink.record(reference_event(change));
            }
            for (original, replacement) in outcome.overlay.iter() {
                combined.insert(original, replacement);
            }
            report.rewritten.extend(
                outcome
                    .rewritten
                    .iter()
                    .map(|&(original, replacement)| Mapping { original, replacement }),
            );
            report.retagged.extend(
                outcome
                    .retagged
                    .iter()
                    .map(|&(original, replacement)| Mapping { original, replacement }),
            );
            report.references.extend(outcome.references);

            // Phase 4: confirm
            let phase_start = Instant::now();
            scan = scanner.scan(store, &progress)?;
            self.profile_phase("Rescan", phase_start);
        }

        // Phase 5: references still broken
        let phase_start = Instant::now();
        let changes = repair_references(store, &self.config)?;
        self.profile_phase("Reference repair", phase_start);
        for change in &changes {
            sink.record(reference_event(change));
        }
        report.references.extend(changes);

        // Phase 6: what is left
        let phase_start = Instant::now();
        let final_scan = scanner.scan(store, &progress)?;
        self.profile_phase("Final scan", phase_start);
        report.remaining = final_scan.issues;
        report.overlay = combined.mappings();

        self.profile_phase("Total", total_start);
        self.log(format!(
            "{} issues found, {} remain",
            report.initial.issues.len(),
            report.remaining.len()
        ));
        Ok(report)
    }
}
