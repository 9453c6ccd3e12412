//! The embeddable archive: an ordered, deduplicated set of entries.
//!
//! An [`Archive`] is what a packaging run produces and what the decoder
//! reconstructs at startup: a format version, the owning module, and one
//! [`Entry`] per packaged filesystem object, unique and totally ordered by
//! identity so that re-serializing an unchanged file set is byte-identical.

mod decode;
mod encode;

pub use decode::decode_archive;
pub use encode::{build_archive, encode_archive, pack};

use std::collections::BTreeMap;

use crate::config::FORMAT_VERSION;
use crate::error::{Error, Result};
use crate::ident::Identity;
use crate::vfs::Metadata;

/// What an entry holds: file bytes or a directory marker.
///
/// Child lists are not stored; the memory backend derives them from the
/// identities present in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A regular file and its exact byte content.
    File { content: Vec<u8> },
    /// A directory.
    Dir,
}

/// One packaged filesystem object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Canonical address of the object.
    pub id: Identity,
    /// File content or directory marker.
    pub kind: EntryKind,
    /// Permission bits (no file-type bits), e.g. `0o644`.
    pub mode: u32,
    /// Modification time, unix seconds.
    pub mtime: u64,
}

impl Entry {
    /// Create a file entry.
    pub fn file(id: Identity, content: Vec<u8>, mode: u32, mtime: u64) -> Self {
        Self {
            id,
            kind: EntryKind::File { content },
            mode,
            mtime,
        }
    }

    /// Create a directory entry.
    pub fn dir(id: Identity, mode: u32, mtime: u64) -> Self {
        Self {
            id,
            kind: EntryKind::Dir,
            mode,
            mtime,
        }
    }

    /// Whether this is a directory entry.
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Dir)
    }

    /// Content bytes for files, `None` for directories.
    pub fn content(&self) -> Option<&[u8]> {
        match &self.kind {
            EntryKind::File { content } => Some(content),
            EntryKind::Dir => None,
        }
    }

    /// Content length in bytes; zero for directories.
    pub fn size(&self) -> u64 {
        self.content().map(|c| c.len() as u64).unwrap_or(0)
    }

    /// The stat view of this entry.
    pub fn metadata(&self) -> Metadata {
        Metadata {
            id: self.id.clone(),
            size: self.size(),
            mode: self.mode,
            mtime: self.mtime,
            is_dir: self.is_dir(),
        }
    }
}

/// An ordered, deduplicated entry set with a format version tag.
#[derive(Debug, Clone)]
pub struct Archive {
    version: u32,
    module: String,
    entries: BTreeMap<Identity, Entry>,
}

impl Archive {
    /// Create an empty archive for `module` at the current format version.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            version: FORMAT_VERSION,
            module: module.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Format version this archive encodes to.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Module the archive was packed for.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Add an entry.
    ///
    /// A duplicate identity with identical kind and content collapses
    /// silently; a duplicate carrying different bytes (or a file/directory
    /// mismatch) is a hard error.
    pub fn push(&mut self, entry: Entry) -> Result<()> {
        if let Some(existing) = self.entries.get(&entry.id) {
            if existing.kind != entry.kind {
                return Err(Error::Duplicate(entry.id.to_string()));
            }
            return Ok(());
        }
        self.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Look up an entry by identity.
    pub fn get(&self, id: &Identity) -> Option<&Entry> {
        self.entries.get(id)
    }

    /// Entries in canonical (lexicographic identity) order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn into_entries(self) -> impl Iterator<Item = Entry> {
        self.entries.into_values()
    }
}
