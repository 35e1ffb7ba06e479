//! Loose objects stored under the wrong name
//!
//! A crash between writing a loose object and renaming it into place can
//! leave valid content at a path that does not match its hash, most often
//! `objects/00/000...`. Such objects read as missing, so they are moved back
//! to the path their content names before anything is scanned.

use flate2::read::ZlibDecoder;
use serde::Serialize;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::codec;
use crate::model::{Hash, ObjectKind};

use super::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelocationOutcome {
    Moved,
    /// Dry run; nothing was touched
    Pending,
    /// The correct path already holds the object; the stray file stays
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relocation {
    /// Hash of the content
    pub hash: Hash,
    /// Path relative to the objects directory
    pub found_at: PathBuf,
    pub outcome: RelocationOutcome,
}

fn is_hex(name: &str, len: usize) -> bool {
    name.len() == len && name.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Hash of a loose object file, `None` when it does not inflate to a valid object
fn content_id(path: &Path) -> Option<Hash> {
    let compressed = fs::read(path).ok()?;
    let mut data = Vec::new();
    ZlibDecoder::new(&compressed[..]).read_to_end(&mut data).ok()?;

    let nul = data.iter().position(|&b| b == 0)?;
    let (kind, len) = data[..nul].split_at(data[..nul].iter().position(|&b| b == b' ')?);
    let kind = ObjectKind::from_name(kind)?;
    let len: usize = std::str::from_utf8(&len[1..]).ok()?.parse().ok()?;
    let body = &data[nul + 1..];
    if body.len() != len {
        return None;
    }
    codec::object_id(kind, body).ok()
}

/// Loose objects whose content hash differs from their path, sorted by path
pub fn find_misplaced(objects_dir: &Path) -> Result<Vec<(PathBuf, Hash)>, StoreError> {
    let mut found = Vec::new();
    if !objects_dir.is_dir() {
        return Ok(found);
    }

    for dir in fs::read_dir(objects_dir)? {
        let dir = dir?;
        let Some(prefix) = dir.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !is_hex(&prefix, 2) || !dir.file_type()?.is_dir() {
            continue;
        }
        for file in fs::read_dir(dir.path())? {
            let file = file?;
            let Some(rest) = file.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_hex(&rest, 38) {
                continue;
            }
            let Ok(named) = format!("{}{}", prefix, rest).parse::<Hash>() else {
                continue;
            };
            match content_id(&file.path()) {
                Some(actual) if actual != named => {
                    debug!("{}/{} holds {}", prefix, rest, actual);
                    found.push((Path::new(&prefix).join(&rest), actual));
                }
                Some(_) => {}
                None => debug!("{}/{} does not inflate to an object", prefix, rest),
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Move misplaced loose objects to the path their hash names
pub fn relocate_misplaced(objects_dir: &Path, dry_run: bool) -> Result<Vec<Relocation>, StoreError> {
    let mut relocations = Vec::new();
    for (found_at, hash) in find_misplaced(objects_dir)? {
        let hex = hash.to_hex();
        let target = objects_dir.join(&hex[..2]).join(&hex[2..]);

        let outcome = if target.exists() {
            warn!("{} already stored; leaving {} in place", hash.short(), found_at.display());
            RelocationOutcome::AlreadyPresent
        } else if dry_run {
            RelocationOutcome::Pending
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(objects_dir.join(&found_at), &target)?;
            info!("moved {} from {}", hash.short(), found_at.display());
            if let Some(dir) = found_at.parent() {
                // Only succeeds once the directory is empty
                let _ = fs::remove_dir(objects_dir.join(dir));
            }
            RelocationOutcome::Moved
        };
        relocations.push(Relocation { hash, found_at, outcome });
    }
    Ok(relocations)
}
