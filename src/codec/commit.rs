use crate::model::{Commit, Hash, Signature};

use super::{parse_hex, CodecError};

pub(super) type Header = (Vec<u8>, Vec<u8>);

/// Split a header block from the message at the first blank line.
/// Continuation lines (leading space) are folded into the previous value with '\n'.
pub(super) fn split_headers(data: &[u8]) -> Result<(Vec<Header>, &[u8]), CodecError> {
    let (header_block, message) = match data.windows(2).position(|w| w == b"\n\n") {
        Some(pos) => (&data[..pos], &data[pos + 2..]),
        None if data.ends_with(b"\n") => (&data[..data.len() - 1], &data[data.len()..]),
        None => return Err(CodecError::Truncated("header")),
    };

    let mut headers: Vec<Header> = Vec::new();
    for line in header_block.split(|&b| b == b'\n') {
        if let Some(continuation) = line.strip_prefix(b" ") {
            let (_, value) = headers.last_mut().ok_or_else(|| {
                CodecError::InvalidHeader(String::from_utf8_lossy(line).into_owned())
            })?;
            value.push(b'\n');
            value.extend_from_slice(continuation);
            continue;
        }
        let space = line
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| CodecError::InvalidHeader(String::from_utf8_lossy(line).into_owned()))?;
        headers.push((line[..space].to_vec(), line[space + 1..].to_vec()));
    }
    Ok((headers, message))
}

pub(super) fn write_header(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    for (i, line) in value.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\n ");
        }
        out.extend_from_slice(line);
    }
    out.push(b'\n');
}

pub(super) fn parse_signature(value: &[u8]) -> Result<Signature, CodecError> {
    let invalid = || CodecError::InvalidSignature(String::from_utf8_lossy(value).into_owned());
    let open = value.iter().position(|&b| b == b'<').ok_or_else(invalid)?;
    let close = value.iter().rposition(|&b| b == b'>').ok_or_else(invalid)?;
    if close < open {
        return Err(invalid());
    }

    let name = value[..open].trim_ascii_end().to_vec();
    let email = value[open + 1..close].to_vec();
    let tail = String::from_utf8_lossy(&value[close + 1..]).into_owned();
    let mut parts = tail.split_whitespace();
    let time = parts
        .next()
        .and_then(|t| t.parse::<i64>().ok())
        .ok_or_else(invalid)?;
    let offset = parts.next().unwrap_or("+0000").to_string();

    let mut signature = Signature {
        name,
        email,
        time,
        offset,
        verbatim: None,
    };
    if format_signature(&signature) != value {
        signature.verbatim = Some(value.to_vec());
    }
    Ok(signature)
}

pub(super) fn format_signature(sig: &Signature) -> Vec<u8> {
    if let Some(verbatim) = &sig.verbatim {
        return verbatim.clone();
    }
    let mut out = Vec::with_capacity(sig.name.len() + sig.email.len() + 24);
    out.extend_from_slice(&sig.name);
    out.extend_from_slice(b" <");
    out.extend_from_slice(&sig.email);
    out.extend_from_slice(b"> ");
    out.extend_from_slice(format!("{} {}", sig.time, sig.offset).as_bytes());
    out
}

pub fn encode_commit(commit: &Commit) -> Vec<u8> {
    let mut out = Vec::with_capacity(256 + commit.message.len());
    write_header(&mut out, b"tree", commit.tree.to_hex().as_bytes());
    for parent in &commit.parents {
        write_header(&mut out, b"parent", parent.to_hex().as_bytes());
    }
    write_header(&mut out, b"author", &format_signature(&commit.author));
    write_header(&mut out, b"committer", &format_signature(&commit.committer));
    for (key, value) in &commit.extra_headers {
        write_header(&mut out, key.as_bytes(), value);
    }
    out.push(b'\n');
    out.extend_from_slice(&commit.message);
    out
}

pub fn decode_commit(data: &[u8]) -> Result<Commit, CodecError> {
    let (headers, message) = split_headers(data)?;
    let mut headers = headers.into_iter().peekable();

    let tree = match headers.next() {
        Some((key, value)) if key == b"tree" => parse_hex(&value)?,
        _ => return Err(CodecError::MissingHeader("tree")),
    };

    let mut parents = Vec::new();
    while let Some((_, value)) = headers.next_if(|(key, _)| key == b"parent") {
        parents.push(parse_hex(&value)?);
    }

    let author = match headers.next() {
        Some((key, value)) if key == b"author" => parse_signature(&value)?,
        _ => return Err(CodecError::MissingHeader("author")),
    };
    let committer = match headers.next() {
        Some((key, value)) if key == b"committer" => parse_signature(&value)?,
        _ => return Err(CodecError::MissingHeader("committer")),
    };

    let extra_headers = headers
        .map(|(key, value)| (String::from_utf8_lossy(&key).into_owned(), value))
        .collect();

    Ok(Commit {
        tree,
        parents,
        author,
        committer,
        extra_headers,
        message: message.to_vec(),
    })
}

/// Whatever could be read back from a commit that fails strict decoding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SalvagedCommit {
    pub tree: Option<Hash>,
    pub parents: Vec<Hash>,
}

/// Scan header lines for well-formed `tree`/`parent` entries, ignoring the rest
pub fn salvage_commit(data: &[u8]) -> SalvagedCommit {
    let mut salvaged = SalvagedCommit::default();
    for line in data.split(|&b| b == b'\n') {
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix(b"tree ") {
            if salvaged.tree.is_none() {
                salvaged.tree = parse_hex(value).ok();
            }
        } else if let Some(value) = line.strip_prefix(b"parent ") {
            if let Ok(parent) = parse_hex(value) {
                salvaged.parents.push(parent);
            }
        }
    }
    salvaged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Commit {
        Commit {
            tree: Hash::from_bytes([1; 20]),
            parents: vec![Hash::from_bytes([2; 20]), Hash::from_bytes([3; 20])],
            author: Signature {
                name: b"Ada Lovelace".to_vec(),
                email: b"ada@example.com".to_vec(),
                time: 1_700_000_000,
                offset: "+0100".to_string(),
                verbatim: None,
            },
            committer: Signature::new("Bob", "bob@example.com", 1_700_000_100),
            extra_headers: vec![(
                "gpgsig".to_string(),
                b"-----BEGIN PGP SIGNATURE-----\n\nabc\n-----END PGP SIGNATURE-----".to_vec(),
            )],
            message: b"Merge things\n\nDetails.\n".to_vec(),
        }
    }

    #[test]
    fn test_encode_matches_git_layout() {
        let commit = Commit {
            extra_headers: vec![],
            parents: vec![],
            ..sample()
        };
        let text = String::from_utf8(encode_commit(&commit)).unwrap();
        let expected = format!(
            "tree {}\nauthor Ada Lovelace <ada@example.com> 1700000000 +0100\n\
             committer Bob <bob@example.com> 1700000100 +0000\n\nMerge things\n\nDetails.\n",
            "01".repeat(20)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_multiline_header_survives_decode() {
        let commit = sample();
        let bytes = encode_commit(&commit);
        assert!(bytes.windows(3).any(|w| w == b"\n \n"));
        assert_eq!(decode_commit(&bytes).unwrap(), commit);
    }

    #[test]
    fn test_zero_parent_parses() {
        let text = format!(
            "tree {}\nparent {}\nauthor A <a@x> 1 +0000\ncommitter A <a@x> 1 +0000\n\nmsg\n",
            "ab".repeat(20),
            "0".repeat(40)
        );
        let commit = decode_commit(text.as_bytes()).unwrap();
        assert_eq!(commit.parents, vec![Hash::ZERO]);
    }

    #[test]
    fn test_missing_author_is_error() {
        let text = format!("tree {}\n\nmsg\n", "ab".repeat(20));
        assert!(matches!(
            decode_commit(text.as_bytes()),
            Err(CodecError::MissingHeader("author"))
        ));
    }

    #[test]
    fn test_salvage_reads_links_from_garbage() {
        let text = format!(
            "tree {}\nparent {}\nparent nothex\nauthor ???\n\nmsg",
            "ab".repeat(20),
            "cd".repeat(20)
        );
        assert!(decode_commit(text.as_bytes()).is_err());
        let salvaged = salvage_commit(text.as_bytes());
        assert_eq!(salvaged.tree, Some(Hash::from_bytes([0xab; 20])));
        assert_eq!(salvaged.parents, vec![Hash::from_bytes([0xcd; 20])]);
    }

    #[test]
    fn test_non_canonical_signatures_reencode_unchanged() {
        let mut text = format!("tree {}\n", "ab".repeat(20)).into_bytes();
        text.extend_from_slice(b"author Jos\xe9  Mar\xeda <jm@x> 1700000000 +0200\n");
        text.extend_from_slice(b"committer <nobody@x> 1700000001 -0130\n");
        text.extend_from_slice(b"encoding ISO-8859-1\n\nmsg\n");
        let commit = decode_commit(&text).unwrap();
        assert_eq!(commit.author.name, b"Jos\xe9  Mar\xeda".to_vec());
        assert_eq!(commit.author.time, 1_700_000_000);
        assert!(commit.committer.name.is_empty());
        assert_eq!(encode_commit(&commit), text);
    }

    #[test]
    fn test_canonical_signature_keeps_no_copy() {
        let text = format!(
            "tree {}\nauthor A <a@x> 1 +0000\ncommitter A <a@x> 1 +0000\n\nmsg\n",
            "ab".repeat(20)
        );
        let commit = decode_commit(text.as_bytes()).unwrap();
        assert!(commit.author.verbatim.is_none());
        assert_eq!(commit.author, Signature::new("A", "a@x", 1));
    }

    #[test]
    fn test_salvage_of_binary_noise_is_empty() {
        assert_eq!(salvage_commit(&[0xff, 0x00, 0x13]), SalvagedCommit::default());
    }
}
