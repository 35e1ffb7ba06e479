// Scanner integration tests
// Builds damaged object graphs in memory and checks what gets classified

mod common;

use common::*;
use repomend::model::{Hash, IssueKind, RefTarget, Subject, HEAD, MODE_BLOB, MODE_SUBMODULE};
use repomend::repair::{NoopProgress, RecordingProgress, ScanReport, Scanner};
use repomend::repository::MemoryStore;

fn scan(store: &MemoryStore) -> ScanReport {
    Scanner::new(true).scan(store, &NoopProgress).unwrap()
}

#[test]
fn test_clean_history_has_no_issues() {
    let mut store = MemoryStore::new();
    linear_history(&mut store);

    let report = scan(&store);
    assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    assert_eq!(report.commits, 3);
    assert_eq!(report.references, 2);
}

#[test]
fn test_fresh_repository_is_clean() {
    let mut store = MemoryStore::new();
    set_head(&mut store, "main");
    assert!(scan(&store).is_clean());
}

#[test]
fn test_null_branch_reference() {
    let mut store = MemoryStore::new();
    linear_history(&mut store);
    set_branch(&mut store, "broken", Hash::ZERO);

    let report = scan(&store);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].kind, IssueKind::NullReference);
    assert_eq!(report.issues[0].subject, Subject::Reference("refs/heads/broken".into()));
    assert!(report.bad_commits(true).is_empty());
}

#[test]
fn test_null_parent_names_the_child() {
    let mut store = MemoryStore::new();
    let t = file_tree(&mut store, &[("a", b"a")]);
    let c = commit(&mut store, t, &[Hash::ZERO], "orphaned", FIXED_TIME);
    set_branch(&mut store, "main", c);

    let report = scan(&store);
    assert_eq!(report.count(IssueKind::NullParent), 1);
    assert_eq!(report.issues[0].commit, Some(c));
    assert_eq!(report.bad_commits(true), vec![c]);
}

#[test]
fn test_unloadable_parent_is_null_parent() {
    let mut store = MemoryStore::new();
    let t = file_tree(&mut store, &[("a", b"a")]);
    let missing = Hash::from_bytes([0x42; 20]);
    let c = commit(&mut store, t, &[missing], "child", FIXED_TIME);
    set_branch(&mut store, "main", c);

    let report = scan(&store);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].kind, IssueKind::NullParent);
    assert_eq!(report.issues[0].subject, Subject::Object(missing));
    assert_eq!(report.issues[0].commit, Some(c));
}

#[test]
fn test_zero_and_missing_root_trees() {
    let mut store = MemoryStore::new();
    let zero = commit(&mut store, Hash::ZERO, &[], "zero tree", FIXED_TIME);
    let absent = Hash::from_bytes([0x77; 20]);
    let missing = commit(&mut store, absent, &[], "missing tree", FIXED_TIME);
    set_branch(&mut store, "a", zero);
    set_branch(&mut store, "b", missing);

    let report = scan(&store);
    assert_eq!(report.count(IssueKind::MissingTree), 2);
    let mut bad = vec![zero, missing];
    bad.sort();
    assert_eq!(report.bad_commits(false), bad);
}

#[test]
fn test_zero_entry_is_corrupted_tree() {
    let mut store = MemoryStore::new();
    let readme = blob(&mut store, b"readme");
    let t = tree(&mut store, &[(MODE_BLOB, "README", readme), (MODE_BLOB, "lost", Hash::ZERO)]);
    let c = commit(&mut store, t, &[], "root", FIXED_TIME);
    set_branch(&mut store, "main", c);

    let report = scan(&store);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].kind, IssueKind::CorruptedTree);
    assert_eq!(report.issues[0].subject, Subject::Object(t));
    assert_eq!(report.issues[0].commit, Some(c));
}

#[test]
fn test_deep_scan_finds_nested_damage() {
    let mut store = MemoryStore::new();
    let inner = tree(&mut store, &[(MODE_BLOB, "gone.rs", Hash::ZERO)]);
    let readme = blob(&mut store, b"readme");
    let root = tree(&mut store, &[(MODE_BLOB, "README", readme), subtree_entry("src", inner)]);
    let c = commit(&mut store, root, &[], "root", FIXED_TIME);
    set_branch(&mut store, "main", c);

    let deep = scan(&store);
    assert_eq!(deep.issues.len(), 1);
    assert_eq!(deep.issues[0].subject, Subject::Object(inner));

    let shallow = Scanner::new(false).scan(&store, &NoopProgress).unwrap();
    assert!(shallow.is_clean());
}

#[test]
fn test_submodule_entries_are_not_followed() {
    let mut store = MemoryStore::new();
    let external = Hash::from_bytes([0x99; 20]);
    let t = tree(&mut store, &[(MODE_SUBMODULE, "vendor", external)]);
    let c = commit(&mut store, t, &[], "with submodule", FIXED_TIME);
    set_branch(&mut store, "main", c);

    assert!(scan(&store).is_clean());
}

#[test]
fn test_missing_tip_commit() {
    let mut store = MemoryStore::new();
    linear_history(&mut store);
    let absent = Hash::from_bytes([0x55; 20]);
    set_branch(&mut store, "lost", absent);

    let report = scan(&store);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].kind, IssueKind::MissingCommit);
    assert_eq!(report.issues[0].subject, Subject::Object(absent));
    assert_eq!(report.bad_commits(true), vec![absent]);
    assert!(report.bad_commits(false).is_empty());
}

#[test]
fn test_dangling_head_with_branches() {
    let mut store = MemoryStore::new();
    linear_history(&mut store);
    store.insert_reference(HEAD, RefTarget::Symbolic("refs/heads/nowhere".into()));

    let report = scan(&store);
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].kind, IssueKind::NullReference);
    assert_eq!(report.issues[0].subject, Subject::Reference(HEAD.into()));
}

#[test]
fn test_shared_damage_reported_per_commit() {
    let mut store = MemoryStore::new();
    let t = tree(&mut store, &[(MODE_BLOB, "lost", Hash::ZERO)]);
    let c1 = commit(&mut store, t, &[], "one", FIXED_TIME);
    let c2 = commit(&mut store, t, &[c1], "two", FIXED_TIME + 1);
    set_branch(&mut store, "main", c2);

    let report = scan(&store);
    assert_eq!(report.count(IssueKind::CorruptedTree), 2);
    assert_eq!(report.trees, 1);
}

#[test]
fn test_scan_is_deterministic() {
    let mut store = MemoryStore::new();
    let [c1, _, _] = linear_history(&mut store);
    let t = tree(&mut store, &[(MODE_BLOB, "x", Hash::ZERO)]);
    let side = commit(&mut store, t, &[c1, Hash::ZERO], "side", FIXED_TIME + 5);
    set_branch(&mut store, "side", side);
    set_branch(&mut store, "null", Hash::ZERO);

    let first = scan(&store);
    let second = scan(&store);
    assert_eq!(first.issues, second.issues);
    assert_eq!(first.issues.len(), 3);
}

#[test]
fn test_scan_reports_both_phases() {
    let mut store = MemoryStore::new();
    linear_history(&mut store);

    let progress = RecordingProgress::new();
    let report = Scanner::new(true).scan(&store, &progress).unwrap();
    let phases = progress.phases();
    assert_eq!(phases.len(), 2);
    assert_eq!(phases[0].total, Some(2));
    assert_eq!(phases[0].done, 2);
    assert_eq!(phases[1].total, None);
    assert_eq!(phases[1].done, report.commits as u64);
    assert!(phases.iter().all(|p| p.finished));
}

#[test]
fn test_scan_records_observed_targets() {
    let mut store = MemoryStore::new();
    let [_, _, c3] = linear_history(&mut store);

    let report = scan(&store);
    let names: Vec<_> = report.observed.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec![HEAD, "refs/heads/main"]);
    assert_eq!(report.observed[1].target, RefTarget::Direct(c3));
}
