use crate::model::{ObjectKind, Tag};

use super::commit::{format_signature, parse_signature, split_headers, write_header};
use super::{parse_hex, CodecError};

pub fn encode_tag(tag: &Tag) -> Vec<u8> {
    let mut out = Vec::with_capacity(128 + tag.message.len());
    write_header(&mut out, b"object", tag.object.to_hex().as_bytes());
    write_header(&mut out, b"type", tag.target_kind.as_str().as_bytes());
    write_header(&mut out, b"tag", tag.name.as_bytes());
    if let Some(tagger) = &tag.tagger {
        write_header(&mut out, b"tagger", &format_signature(tagger));
    }
    out.push(b'\n');
    out.extend_from_slice(&tag.message);
    out
}

pub fn decode_tag(data: &[u8]) -> Result<Tag, CodecError> {
    let (headers, message) = split_headers(data)?;

    let mut object = None;
    let mut target_kind = None;
    let mut name = None;
    let mut tagger = None;
    for (key, value) in headers {
        match key.as_slice() {
            b"object" => object = Some(parse_hex(&value)?),
            b"type" => {
                target_kind = Some(ObjectKind::from_name(&value).ok_or_else(|| {
                    CodecError::UnknownKind(String::from_utf8_lossy(&value).into_owned())
                })?)
            }
            b"tag" => name = Some(String::from_utf8_lossy(&value).into_owned()),
            b"tagger" => tagger = Some(parse_signature(&value)?),
            _ => {}
        }
    }

    Ok(Tag {
        object: object.ok_or(CodecError::MissingHeader("object"))?,
        target_kind: target_kind.ok_or(CodecError::MissingHeader("type"))?,
        name: name.ok_or(CodecError::MissingHeader("tag"))?,
        tagger,
        message: message.to_vec(),
    })
}
