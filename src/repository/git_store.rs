use git2::{ErrorCode, ObjectType, Oid, ReferenceType, Repository};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::model::{Hash, ObjectKind, RawObject, RefTarget, Reference, HEAD};

use super::loose::{self, Relocation};
use super::packed_refs;
use super::store::{Lookup, ObjectStore, RefUpdate, StoreError};

const REFLOG_MESSAGE: &str = "repomend: repair";

/// On-disk git repository accessed through libgit2
pub struct GitStore {
    repo: Repository,
    path: PathBuf,
}

fn to_oid(hash: &Hash) -> Result<Oid, git2::Error> {
    Oid::from_bytes(hash.as_bytes())
}

fn from_oid(oid: Oid) -> Option<Hash> {
    Hash::from_slice(oid.as_bytes())
}

fn git_kind(kind: ObjectKind) -> ObjectType {
    match kind {
        ObjectKind::Commit => ObjectType::Commit,
        ObjectKind::Tree => ObjectType::Tree,
        ObjectKind::Blob => ObjectType::Blob,
        ObjectKind::Tag => ObjectType::Tag,
    }
}

/// Parse the contents of a `HEAD` file libgit2 refused to read
fn parse_head_file(content: &str) -> RefTarget {
    let content = content.trim();
    if let Some(target) = content.strip_prefix("ref:") {
        return RefTarget::Symbolic(target.trim().to_string());
    }
    RefTarget::Direct(content.parse().unwrap_or(Hash::ZERO))
}

impl GitStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let repo = Repository::open(&path)?;
        Ok(Self { repo, path })
    }

    /// Path the repository was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    fn read_head(&self) -> Option<RefTarget> {
        match self.repo.find_reference(HEAD) {
            Ok(head) => match head.kind() {
                Some(ReferenceType::Symbolic) => head
                    .symbolic_target()
                    .map(|t| RefTarget::Symbolic(t.to_string())),
                _ => head.target().and_then(from_oid).map(RefTarget::Direct),
            },
            Err(e) => {
                debug!("libgit2 could not read HEAD ({}), parsing file", e);
                let content = fs::read_to_string(self.git_dir().join(HEAD)).ok()?;
                Some(parse_head_file(&content))
            }
        }
    }

    fn write_head(&self, target: &RefTarget) -> Result<(), StoreError> {
        let content = match target {
            RefTarget::Direct(hash) => format!("{}\n", hash),
            RefTarget::Symbolic(name) => format!("ref: {}\n", name),
        };
        fs::write(self.git_dir().join(HEAD), content)?;
        Ok(())
    }

    /// Move loose objects stored under a path other than their hash back into place
    pub fn relocate_misplaced_objects(&self, dry_run: bool) -> Result<Vec<Relocation>, StoreError> {
        loose::relocate_misplaced(&self.git_dir().join("objects"), dry_run)
    }

    /// Remove duplicate and stray peel lines from `packed-refs`; returns lines removed
    pub fn tidy_packed_refs(&self, dry_run: bool) -> Result<usize, StoreError> {
        let path = self.git_dir().join("packed-refs");
        if !path.exists() {
            return Ok(0);
        }
        let content = fs::read_to_string(&path)?;
        let (tidy, removed) = packed_refs::tidy_packed_refs(&content);
        if removed > 0 && !dry_run {
            fs::write(&path, tidy)?;
        }
        Ok(removed)
    }
}

impl ObjectStore for GitStore {
    fn read_raw(&self, hash: &Hash) -> Lookup<RawObject> {
        let oid = match to_oid(hash) {
            Ok(oid) => oid,
            Err(e) => return Lookup::Corrupt(e.to_string()),
        };
        let odb = match self.repo.odb() {
            Ok(odb) => odb,
            Err(e) => return Lookup::Corrupt(e.to_string()),
        };
        match odb.read(oid) {
            Ok(object) => {
                let kind = match object.kind() {
                    ObjectType::Commit => ObjectKind::Commit,
                    ObjectType::Tree => ObjectKind::Tree,
                    ObjectType::Blob => ObjectKind::Blob,
                    ObjectType::Tag => ObjectKind::Tag,
                    other => return Lookup::Corrupt(format!("unsupported object type {}", other)),
                };
                Lookup::Found(RawObject::new(kind, object.data().to_vec()))
            }
            Err(e) if e.code() == ErrorCode::NotFound => Lookup::Missing,
            Err(e) => Lookup::Corrupt(e.message().to_string()),
        }
    }

    fn write_raw(&mut self, kind: ObjectKind, data: &[u8]) -> Result<Hash, StoreError> {
        let oid = self.repo.odb()?.write(git_kind(kind), data)?;
        from_oid(oid).ok_or_else(|| StoreError::Rejected(format!("unexpected id length for {}", oid)))
    }

    fn list_references(&self) -> Result<Vec<Reference>, StoreError> {
        let mut refs = Vec::new();
        if let Some(target) = self.read_head() {
            refs.push(Reference {
                name: HEAD.to_string(),
                target,
            });
        }

        for reference in self.repo.references()? {
            let reference = match reference {
                Ok(r) => r,
                Err(e) => {
                    warn!("skipping unreadable reference: {}", e);
                    continue;
                }
            };
            let Some(name) = reference.name() else {
                warn!("skipping reference with non-UTF-8 name");
                continue;
            };
            let target = match reference.kind() {
                Some(ReferenceType::Symbolic) => reference
                    .symbolic_target()
                    .map(|t| RefTarget::Symbolic(t.to_string())),
                _ => reference.target().and_then(from_oid).map(RefTarget::Direct),
            };
            if let Some(target) = target {
                refs.push(Reference {
                    name: name.to_string(),
                    target,
                });
            }
        }

        refs.sort_by(|a, b| a.name.cmp(&b.name));
        refs.dedup_by(|a, b| a.name == b.name);
        Ok(refs)
    }

    fn find_reference(&self, name: &str) -> Result<Option<Reference>, StoreError> {
        if name == HEAD {
            return Ok(self.read_head().map(|target| Reference {
                name: HEAD.to_string(),
                target,
            }));
        }
        match self.repo.find_reference(name) {
            Ok(reference) => {
                let target = match reference.kind() {
                    Some(ReferenceType::Symbolic) => reference
                        .symbolic_target()
                        .map(|t| RefTarget::Symbolic(t.to_string())),
                    _ => reference.target().and_then(from_oid).map(RefTarget::Direct),
                };
                Ok(target.map(|target| Reference {
                    name: name.to_string(),
                    target,
                }))
            }
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_reference(&mut self, name: &str, new: Hash, expected: Hash) -> Result<RefUpdate, StoreError> {
        if name == HEAD {
            let current = self.read_head();
            if current != Some(RefTarget::Direct(expected)) {
                return Ok(RefUpdate::Conflict { actual: current });
            }
            self.write_head(&RefTarget::Direct(new))?;
            return Ok(RefUpdate::Applied);
        }

        let result = self
            .repo
            .reference_matching(name, to_oid(&new)?, true, to_oid(&expected)?, REFLOG_MESSAGE);
        match result {
            Ok(_) => Ok(RefUpdate::Applied),
            Err(e) if matches!(e.code(), ErrorCode::Modified | ErrorCode::NotFound) => {
                debug!("compare-and-swap on {} failed: {}", name, e);
                let actual = self.find_reference(name)?.map(|r| r.target);
                Ok(RefUpdate::Conflict { actual })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn set_symbolic_reference(&mut self, name: &str, target: &str) -> Result<(), StoreError> {
        if name == HEAD {
            return self.write_head(&RefTarget::Symbolic(target.to_string()));
        }
        self.repo
            .reference_symbolic(name, target, true, REFLOG_MESSAGE)?;
        Ok(())
    }

    fn remove_reference(&mut self, name: &str) -> Result<(), StoreError> {
        match self.repo.find_reference(name) {
            Ok(mut reference) => {
                reference.delete()?;
                Ok(())
            }
            Err(e) if e.code() == ErrorCode::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_head_file() {
        assert_eq!(
            parse_head_file("ref: refs/heads/main\n"),
            RefTarget::Symbolic("refs/heads/main".to_string())
        );
        assert_eq!(
            parse_head_file("0000000000000000000000000000000000000000\n"),
            RefTarget::Direct(Hash::ZERO)
        );
        assert_eq!(parse_head_file("garbage"), RefTarget::Direct(Hash::ZERO));
    }
}
