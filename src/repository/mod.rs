mod git_store;
mod journal;
mod loose;
mod memory;
mod packed_refs;
mod staged;
mod store;

pub use git_store::GitStore;
pub use journal::{Journal, RunRecord, RunSummary};
pub use loose::{find_misplaced, relocate_misplaced, Relocation, RelocationOutcome};
pub use memory::MemoryStore;
pub use packed_refs::tidy_packed_refs;
pub use staged::{StagedRefChange, StagedStore};
pub use store::{Lookup, ObjectStore, RefUpdate, Resolved, StoreError, MAX_PEEL_DEPTH, MAX_SYMREF_DEPTH};

// Journal schema version; a mismatch rebuilds the tables
pub const SCHEMA_VERSION: &str = "1";
