//! Resolved declarations → archive → generated artifact.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use data_encoding::{BASE64, HEXLOWER};
use sha2::{Digest, Sha256};

use crate::archive::{Archive, Entry};
use crate::config::{format_tag, FORMAT_END};
use crate::error::{Error, Result};
use crate::resolver::Declaration;
use crate::vfs::{Backend, Metadata};

/// Read every declaration through `backend` into an archive.
///
/// File declarations become single entries; directory declarations embed the
/// directory and its whole subtree. Nothing is written anywhere: failures
/// here leave the filesystem untouched.
pub fn build_archive(
    backend: &dyn Backend,
    declarations: &[Declaration],
) -> Result<Archive> {
    let mut archive = Archive::new(backend.module());
    for decl in declarations {
        let meta = backend.stat(&decl.id)?;
        if meta.is_dir {
            for descendant in backend.walk(&decl.id)? {
                archive.push(entry_for(backend, &descendant)?)?;
            }
        } else {
            archive.push(entry_for(backend, &meta)?)?;
        }
    }
    Ok(archive)
}

fn entry_for(backend: &dyn Backend, meta: &Metadata) -> Result<Entry> {
    if meta.is_dir {
        Ok(Entry::dir(meta.id.clone(), meta.mode, meta.mtime))
    } else {
        let file = backend.open(&meta.id)?;
        Ok(Entry::file(
            meta.id.clone(),
            file.into_bytes(),
            meta.mode,
            meta.mtime,
        ))
    }
}

/// Serialize an archive to its textual container form.
///
/// The output is deterministic for a given archive, and free of `"` so it
/// can sit inside a raw string literal verbatim.
pub fn encode_archive(archive: &Archive) -> String {
    let mut out = String::new();
    out.push_str(&format_tag(archive.version()));
    out.push(' ');
    out.push_str(archive.module());
    out.push('\n');
    for entry in archive.entries() {
        let kind = if entry.is_dir() { "d" } else { "f" };
        let content = BASE64.encode(entry.content().unwrap_or_default());
        out.push_str(&format!(
            "{}\t{}\t{:o}\t{}\t{}\t{}\n",
            entry.id,
            kind,
            entry.mode,
            entry.size(),
            entry.mtime,
            content
        ));
    }
    let digest = HEXLOWER.encode(&Sha256::digest(out.as_bytes()));
    out.push_str(FORMAT_END);
    out.push(' ');
    out.push_str(&digest);
    out.push('\n');
    out
}

/// Run the whole serialization pipeline and write the generated artifact.
///
/// The archive is assembled in memory before `dest` is touched, any stale
/// file at `dest` is replaced, and a partially written artifact is removed
/// on every early exit.
pub fn pack(backend: &dyn Backend, declarations: &[Declaration], dest: &Path) -> Result<()> {
    let archive = build_archive(backend, declarations)?;
    let artifact = render_artifact(archive.module(), &encode_archive(&archive));

    if dest.exists() {
        fs::remove_file(dest).map_err(|e| Error::io(dest, e))?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut guard = CleanupGuard::new(dest);
    {
        let file = fs::File::create(dest).map_err(|e| Error::io(dest, e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(artifact.as_bytes())
            .map_err(|e| Error::io(dest, e))?;
        writer.flush().map_err(|e| Error::io(dest, e))?;
    }
    guard.disarm();
    Ok(())
}

fn render_artifact(module: &str, encoded: &str) -> String {
    let mut out = String::new();
    out.push_str("// @generated by packfs; do not edit.\n");
    out.push_str("//\n");
    out.push_str(&format!(
        "// Embedded assets for `{}`. Recreate with `packfs pack`.\n",
        module
    ));
    out.push('\n');
    out.push_str("use std::sync::Arc;\n");
    out.push('\n');
    out.push_str("use packfs::mem;\n");
    out.push('\n');
    out.push_str("/// Install the embedded assets as the process-wide filesystem.\n");
    out.push_str("pub fn init() -> packfs::Result<()> {\n");
    out.push_str("    packfs::apply(Arc::new(mem::decode(ARCHIVE)?))\n");
    out.push_str("}\n");
    out.push('\n');
    out.push_str("static ARCHIVE: &str = r#\"");
    out.push_str(encoded);
    out.push_str("\"#;\n");
    out
}

/// Removes a partially written artifact unless disarmed first.
struct CleanupGuard<'a> {
    path: &'a Path,
    armed: bool,
}

impl<'a> CleanupGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_file(self.path);
        }
    }
}
