//! Textual container → [`Archive`] reconstruction.

use data_encoding::{BASE64, HEXLOWER};
use sha2::{Digest, Sha256};

use crate::archive::{Archive, Entry};
use crate::config::{format_tag, FORMAT_END, FORMAT_PREFIX, FORMAT_VERSION};
use crate::error::{Error, Result};
use crate::ident::Identity;

/// Reconstruct an archive from its textual encoding.
///
/// Decoding is pure: it touches no host filesystem. An unknown version tag
/// is [`Error::UnsupportedFormat`]; any malformed record, truncation or
/// digest mismatch is [`Error::Corrupt`].
pub fn decode_archive(text: &str) -> Result<Archive> {
    let mut hasher = Sha256::new();
    let mut lines = text.split_inclusive('\n');

    let header = lines
        .next()
        .ok_or_else(|| Error::Corrupt("empty archive".to_string()))?;
    let module = parse_header(header.strip_suffix('\n').unwrap_or(header))?;
    if !header.ends_with('\n') {
        return Err(Error::Corrupt("truncated header".to_string()));
    }
    hasher.update(header.as_bytes());

    let mut archive = Archive::new(module);
    let mut end_digest = None;
    for line in lines.by_ref() {
        let body = line
            .strip_suffix('\n')
            .ok_or_else(|| Error::Corrupt("truncated archive".to_string()))?;
        if let Some(hex) = end_marker(body) {
            end_digest = Some(hex);
            break;
        }
        hasher.update(line.as_bytes());
        archive.push(parse_record(body, archive.module())?)?;
    }
    if lines.next().is_some() {
        return Err(Error::Corrupt("data after end marker".to_string()));
    }

    let expected =
        end_digest.ok_or_else(|| Error::Corrupt("missing end marker".to_string()))?;
    let actual = HEXLOWER.encode(&hasher.finalize());
    if expected != actual {
        return Err(Error::Corrupt("digest mismatch".to_string()));
    }
    Ok(archive)
}

/// Validate the version line and extract the module.
///
/// The version decision comes first: a well-formed tag for a version we do
/// not speak is `UnsupportedFormat` no matter what follows it.
fn parse_header(header: &str) -> Result<&str> {
    let (tag, module) = match header.split_once(' ') {
        Some(parts) => parts,
        None if header.starts_with(FORMAT_PREFIX) => (header, ""),
        None => return Err(Error::Corrupt(format!("unrecognized header: {:?}", header))),
    };
    if tag != format_tag(FORMAT_VERSION) {
        if tag.starts_with(FORMAT_PREFIX) {
            return Err(Error::UnsupportedFormat(tag.to_string()));
        }
        return Err(Error::Corrupt(format!("unrecognized header: {:?}", tag)));
    }
    if module.is_empty() {
        return Err(Error::Corrupt("missing module in header".to_string()));
    }
    Ok(module)
}

fn end_marker(body: &str) -> Option<&str> {
    // A record's identity field could begin with the marker text, but never
    // followed by a space (modules cannot contain whitespace), so this
    // cannot misfire on a record line.
    body.strip_prefix(FORMAT_END)
        .and_then(|rest| rest.strip_prefix(' '))
}

fn parse_record(body: &str, module: &str) -> Result<Entry> {
    let mut fields = body.split('\t');
    let mut next = |name: &str| {
        fields
            .next()
            .ok_or_else(|| Error::Corrupt(format!("record missing {} field", name)))
    };
    let raw_id = next("identity")?;
    let kind = next("kind")?;
    let mode = next("mode")?;
    let size = next("size")?;
    let mtime = next("mtime")?;
    let content = next("content")?;
    if fields.next().is_some() {
        return Err(Error::Corrupt(format!("record has extra fields: {:?}", body)));
    }

    let id = Identity::parse(raw_id, module)
        .map_err(|e| Error::Corrupt(format!("bad identity {:?}: {}", raw_id, e)))?;
    if id.module() != module {
        return Err(Error::Corrupt(format!(
            "entry {} does not belong to module {}",
            id, module
        )));
    }
    let mode = u32::from_str_radix(mode, 8)
        .map_err(|_| Error::Corrupt(format!("bad mode {:?}", mode)))?;
    let size: u64 = size
        .parse()
        .map_err(|_| Error::Corrupt(format!("bad size {:?}", size)))?;
    let mtime: u64 = mtime
        .parse()
        .map_err(|_| Error::Corrupt(format!("bad mtime {:?}", mtime)))?;

    match kind {
        "d" => {
            if size != 0 || !content.is_empty() {
                return Err(Error::Corrupt(format!(
                    "directory {} carries content",
                    id
                )));
            }
            Ok(Entry::dir(id, mode, mtime))
        }
        "f" => {
            let content = BASE64
                .decode(content.as_bytes())
                .map_err(|e| Error::Corrupt(format!("bad content for {}: {}", id, e)))?;
            if content.len() as u64 != size {
                return Err(Error::Corrupt(format!(
                    "size mismatch for {}: header says {}, content is {}",
                    id,
                    size,
                    content.len()
                )));
            }
            Ok(Entry::file(id, content, mode, mtime))
        }
        other => Err(Error::Corrupt(format!("unknown entry kind {:?}", other))),
    }
}
