// Shared benchmark helpers
// Functions here are used across different benchmark files
#![allow(dead_code)]

use repomend::config::RepairConfig;
use repomend::model::{
    Blob, Commit, Hash, Object, RefTarget, Signature, Tree, TreeEntry, HEAD, MODE_BLOB, MODE_TREE,
};
use repomend::repository::MemoryStore;

pub fn bench_config() -> RepairConfig {
    RepairConfig {
        synthetic_timestamp: Some(1_700_000_000),
        ..RepairConfig::default()
    }
}

/// One snapshot: `dirs` directories of `files_per_dir` files, `version` in every blob.
/// With `damaged`, the last file of the first directory points at the zero hash.
fn snapshot(store: &mut MemoryStore, dirs: usize, files_per_dir: usize, version: usize, damaged: bool) -> Hash {
    let mut root = Vec::with_capacity(dirs);
    for d in 0..dirs {
        let mut entries = Vec::with_capacity(files_per_dir);
        for f in 0..files_per_dir {
            // Only a slice of files changes per version, the rest dedupe
            let rev = if f % 10 == version % 10 { version } else { 0 };
            let data = format!("// dir {} file {} rev {}\n", d, f, rev).into_bytes();
            let hash = if damaged && d == 0 && f + 1 == files_per_dir {
                Hash::ZERO
            } else {
                store.insert(&Object::Blob(Blob { data })).unwrap()
            };
            entries.push(TreeEntry::new(MODE_BLOB, format!("file_{:03}.rs", f), hash));
        }
        let subtree = store.insert(&Object::Tree(Tree::new(entries))).unwrap();
        root.push(TreeEntry::new(MODE_TREE, format!("dir_{:03}", d), subtree));
    }
    store.insert(&Object::Tree(Tree::new(root))).unwrap()
}

/// Linear history of `commits` commits on `main`; every `damage_every`-th
/// commit gets a damaged tree (0 for none)
pub fn generate_history(commits: usize, dirs: usize, files_per_dir: usize, damage_every: usize) -> MemoryStore {
    let mut store = MemoryStore::new();
    let mut parent: Option<Hash> = None;
    for i in 0..commits {
        let damaged = damage_every > 0 && i % damage_every == damage_every - 1;
        let tree = snapshot(&mut store, dirs, files_per_dir, i, damaged);
        let time = 1_600_000_000 + i as i64 * 60;
        let commit = Commit {
            tree,
            parents: parent.into_iter().collect(),
            author: Signature::new("Bench", "bench@example.com", time),
            committer: Signature::new("Bench", "bench@example.com", time),
            extra_headers: Vec::new(),
            message: format!("Commit {}\n", i).into_bytes(),
        };
        parent = Some(store.insert(&Object::Commit(commit)).unwrap());
    }
    if let Some(tip) = parent {
        store.insert_reference("refs/heads/main", RefTarget::Direct(tip));
    }
    store.insert_reference(HEAD, RefTarget::Symbolic("refs/heads/main".to_string()));
    store
}
