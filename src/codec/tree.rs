use crate::model::{Hash, Tree, TreeEntry, HASH_LEN};

use super::CodecError;

/// Entries are written in the order given
pub fn encode_tree(tree: &Tree) -> Vec<u8> {
    let mut out = Vec::with_capacity(tree.entries.len() * (HASH_LEN + 16));
    for entry in &tree.entries {
        out.extend_from_slice(format!("{:o}", entry.mode).as_bytes());
        out.push(b' ');
        out.extend_from_slice(&entry.name);
        out.push(0);
        out.extend_from_slice(entry.hash.as_bytes());
    }
    out
}

pub fn decode_tree(data: &[u8]) -> Result<Tree, CodecError> {
    let mut entries = Vec::new();
    let mut rest = data;

    while !rest.is_empty() {
        let space = rest
            .iter()
            .position(|&b| b == b' ')
            .ok_or(CodecError::Truncated("tree"))?;
        let mode_text = &rest[..space];
        let mode = std::str::from_utf8(mode_text)
            .ok()
            .filter(|s| !s.is_empty())
            .and_then(|s| u32::from_str_radix(s, 8).ok())
            .ok_or_else(|| CodecError::InvalidMode(String::from_utf8_lossy(mode_text).into_owned()))?;
        rest = &rest[space + 1..];

        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(CodecError::Truncated("tree"))?;
        if nul == 0 {
            return Err(CodecError::InvalidHeader("tree entry with empty name".to_string()));
        }
        let name = rest[..nul].to_vec();
        rest = &rest[nul + 1..];

        if rest.len() < HASH_LEN {
            return Err(CodecError::Truncated("tree"));
        }
        let hash = Hash::from_slice(&rest[..HASH_LEN]).ok_or(CodecError::Truncated("tree"))?;
        rest = &rest[HASH_LEN..];

        entries.push(TreeEntry { mode, name, hash });
    }

    Ok(Tree { entries })
}
