// Shared test fixtures for integration tests
// Functions here are used across different test files
#![allow(dead_code)]

use git2::Repository;
use repomend::config::RepairConfig;
use repomend::model::{
    Blob, Commit, Hash, Object, RefTarget, Signature, Tree, TreeEntry, HEAD, MODE_BLOB, MODE_TREE,
};
use repomend::repair::{EventLog, RepairReport, Repairer};
use repomend::repository::{MemoryStore, ObjectStore};
use std::path::PathBuf;
use tempfile::TempDir;

pub const FIXED_TIME: i64 = 1_700_000_000;

/// Config with a pinned clock so synthesized commits hash the same every run
pub fn test_config() -> RepairConfig {
    RepairConfig {
        synthetic_timestamp: Some(FIXED_TIME),
        ..RepairConfig::default()
    }
}

pub fn run_repair(store: &mut MemoryStore, config: RepairConfig) -> RepairReport {
    let mut events = EventLog::new();
    Repairer::quiet(config).repair(store, &mut events).unwrap()
}

pub fn signature(time: i64) -> Signature {
    Signature::new("Test User", "test@example.com", time)
}

pub fn blob(store: &mut MemoryStore, content: &[u8]) -> Hash {
    store
        .insert(&Object::Blob(Blob {
            data: content.to_vec(),
        }))
        .unwrap()
}

/// Tree from `(mode, name, hash)` triples, stored as given (zero hashes included)
pub fn tree(store: &mut MemoryStore, entries: &[(u32, &str, Hash)]) -> Hash {
    let entries = entries
        .iter()
        .map(|(mode, name, hash)| TreeEntry::new(*mode, name.as_bytes(), *hash))
        .collect();
    store.insert(&Object::Tree(Tree::new(entries))).unwrap()
}

/// Flat tree of regular files
pub fn file_tree(store: &mut MemoryStore, files: &[(&str, &[u8])]) -> Hash {
    let entries: Vec<(u32, &str, Hash)> = files
        .iter()
        .map(|(name, content)| (MODE_BLOB, *name, blob(store, content)))
        .collect();
    tree(store, &entries)
}

pub fn subtree_entry<'a>(name: &'a str, hash: Hash) -> (u32, &'a str, Hash) {
    (MODE_TREE, name, hash)
}

pub fn commit_object(tree: Hash, parents: &[Hash], message: &str, time: i64) -> Commit {
    Commit {
        tree,
        parents: parents.to_vec(),
        author: signature(time),
        committer: signature(time),
        extra_headers: Vec::new(),
        message: format!("{}\n", message).into_bytes(),
    }
}

pub fn commit(store: &mut MemoryStore, tree: Hash, parents: &[Hash], message: &str, time: i64) -> Hash {
    store
        .insert(&Object::Commit(commit_object(tree, parents, message, time)))
        .unwrap()
}

pub fn set_branch(store: &mut MemoryStore, name: &str, hash: Hash) {
    store.insert_reference(format!("refs/heads/{}", name), RefTarget::Direct(hash));
}

pub fn set_head(store: &mut MemoryStore, branch: &str) {
    store.insert_reference(HEAD, RefTarget::Symbolic(format!("refs/heads/{}", branch)));
}

pub fn branch_target(store: &MemoryStore, name: &str) -> Option<Hash> {
    match store.reference_target(&format!("refs/heads/{}", name)) {
        Some(RefTarget::Direct(hash)) => Some(*hash),
        _ => None,
    }
}

pub fn load_commit(store: &MemoryStore, hash: &Hash) -> Commit {
    store.load_commit(hash).found().unwrap()
}

/// A clean three-commit line `c1 <- c2 <- c3` on `main`; returns the hashes
pub fn linear_history(store: &mut MemoryStore) -> [Hash; 3] {
    let t1 = file_tree(store, &[("a.txt", b"one")]);
    let c1 = commit(store, t1, &[], "first", FIXED_TIME);
    let t2 = file_tree(store, &[("a.txt", b"two")]);
    let c2 = commit(store, t2, &[c1], "second", FIXED_TIME + 10);
    let t3 = file_tree(store, &[("a.txt", b"three")]);
    let c3 = commit(store, t3, &[c2], "third", FIXED_TIME + 20);
    set_branch(store, "main", c3);
    set_head(store, "main");
    [c1, c2, c3]
}

/// Create a temporary git repository
pub fn create_test_repo() -> (TempDir, PathBuf, Repository) {
    let dir = TempDir::new().unwrap();
    let repo_path = dir.path().to_path_buf();
    let repo = Repository::init(&repo_path).unwrap();

    // Configure git user for commits
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "Test User").unwrap();
    config.set_str("user.email", "test@example.com").unwrap();

    (dir, repo_path, repo)
}

/// Add files to the repository and create a commit on HEAD
pub fn add_commit(repo: &Repository, files: &[(&str, &[u8])], message: &str) -> git2::Oid {
    let sig = git2::Signature::now("Test User", "test@example.com").unwrap();

    let mut index = repo.index().unwrap();

    for (path, content) in files {
        // Write file to working directory
        let full_path = repo.workdir().unwrap().join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full_path, content).unwrap();

        // Add to index
        index.add_path(std::path::Path::new(path)).unwrap();
    }

    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    // Get parent commit if exists
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());

    match parent {
        Some(parent) => repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
            .unwrap(),
        None => repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[]).unwrap(),
    }
}

/// Write raw commit bytes straight into the object database, bypassing validation
pub fn write_raw_commit(repo: &Repository, data: &[u8]) -> git2::Oid {
    repo.odb()
        .unwrap()
        .write(git2::ObjectType::Commit, data)
        .unwrap()
}

/// Commit text with arbitrary (possibly zero) tree and parent ids
pub fn raw_commit_text(tree: &str, parents: &[&str], message: &str) -> Vec<u8> {
    let mut text = format!("tree {}\n", tree);
    for parent in parents {
        text.push_str(&format!("parent {}\n", parent));
    }
    text.push_str(&format!(
        "author Test User <test@example.com> {} +0000\ncommitter Test User <test@example.com> {} +0000\n\n{}\n",
        FIXED_TIME, FIXED_TIME, message
    ));
    text.into_bytes()
}

/// Create an in-memory journal with its schema in place
pub async fn create_test_journal() -> repomend::repository::Journal {
    let journal = repomend::repository::Journal::new(":memory:").await.unwrap();
    journal.init_schema().await.unwrap();
    journal
}
