//! In-memory backend, the runtime home of unpacked archives.

use std::collections::BTreeMap;

use crate::archive::{Archive, Entry};
use crate::config::DEFAULT_DIR_MODE;
use crate::error::{Error, Result};
use crate::ident::Identity;
use crate::vfs::{Backend, File, Metadata};

/// Decode an encoded archive into a ready-to-serve memory backend.
///
/// This is the call generated artifacts make at startup.
pub fn decode(text: &str) -> Result<MemBackend> {
    MemBackend::from_archive(crate::archive::decode_archive(text)?)
}

/// A backend serving every file and directory from memory.
///
/// The tree is fixed at construction: writes fail with [`Error::ReadOnly`],
/// lookups never touch the host filesystem, and the backend shares across
/// threads without locking.
#[derive(Debug)]
pub struct MemBackend {
    module: String,
    entries: BTreeMap<Identity, Entry>,
    children: BTreeMap<Identity, Vec<Identity>>,
}

impl MemBackend {
    /// Build a tree from a decoded archive.
    ///
    /// Parent directories missing from the archive (an archive may carry a
    /// deep file without its ancestors) are synthesized with default modes,
    /// so every embedded file's parent chain is listable.
    pub fn from_archive(archive: Archive) -> Result<Self> {
        let module = archive.module().to_string();
        let root = Identity::new(&module, "/")?;
        let mut entries = BTreeMap::new();
        entries.insert(root.clone(), Entry::dir(root, DEFAULT_DIR_MODE, 0));
        for entry in archive.into_entries() {
            synthesize_parents(&mut entries, &entry.id);
            entries.insert(entry.id.clone(), entry);
        }
        let mut children: BTreeMap<Identity, Vec<Identity>> = BTreeMap::new();
        for id in entries.keys() {
            if let Some(parent) = id.parent() {
                children.entry(parent).or_default().push(id.clone());
            }
        }
        Ok(Self {
            module,
            entries,
            children,
        })
    }

    /// Number of entries, the root included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree holds nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn get(&self, id: &Identity) -> Result<&Entry> {
        if id.module() != self.module {
            return Err(Error::NotFound(id.to_string()));
        }
        self.entries
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

impl Backend for MemBackend {
    fn module(&self) -> &str {
        &self.module
    }

    fn open(&self, id: &Identity) -> Result<File> {
        let entry = self.get(id)?;
        match entry.content() {
            Some(content) => Ok(File::new(entry.metadata(), content.to_vec())),
            None => Err(Error::NotAFile(id.to_string())),
        }
    }

    fn create(&self, id: &Identity, _content: &[u8]) -> Result<()> {
        Err(Error::ReadOnly(id.to_string()))
    }

    fn stat(&self, id: &Identity) -> Result<Metadata> {
        self.get(id).map(Entry::metadata)
    }

    fn read_dir(&self, id: &Identity) -> Result<Vec<Metadata>> {
        let dir = self.get(id)?;
        if !dir.is_dir() {
            return Err(Error::NotADirectory(id.to_string()));
        }
        let kids = match self.children.get(id) {
            Some(kids) => kids,
            None => return Ok(Vec::new()),
        };
        Ok(kids
            .iter()
            .filter_map(|k| self.entries.get(k))
            .map(Entry::metadata)
            .collect())
    }

    fn walk(&self, id: &Identity) -> Result<Vec<Metadata>> {
        let start = self.get(id)?;
        if !start.is_dir() {
            return Err(Error::NotADirectory(id.to_string()));
        }
        // The start sorts first: every descendant path extends it.
        Ok(self
            .entries
            .values()
            .filter(|e| e.id.is_under(id))
            .map(Entry::metadata)
            .collect())
    }

    fn remove(&self, id: &Identity) -> Result<()> {
        Err(Error::ReadOnly(id.to_string()))
    }

    fn mkdir_all(&self, id: &Identity) -> Result<()> {
        Err(Error::ReadOnly(id.to_string()))
    }
}

fn synthesize_parents(entries: &mut BTreeMap<Identity, Entry>, id: &Identity) {
    let mut missing = Vec::new();
    let mut cursor = id.parent();
    while let Some(parent) = cursor {
        if entries.contains_key(&parent) {
            break;
        }
        cursor = parent.parent();
        missing.push(parent);
    }
    for parent in missing {
        entries.insert(parent.clone(), Entry::dir(parent, DEFAULT_DIR_MODE, 0));
    }
}
