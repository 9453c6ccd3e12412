//! Overlay backend: a writable primary stacked over read-only fallbacks.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::ident::Identity;
use crate::vfs::{Backend, File, Metadata};

/// A backend composed of a primary layer and an ordered chain of
/// secondaries.
///
/// Lookups return the first hit walking primary-then-secondaries; listings
/// merge every layer with the earliest layer winning per name. Writes only
/// ever touch the primary.
pub struct OverlayBackend {
    primary: Arc<dyn Backend>,
    secondaries: Vec<Arc<dyn Backend>>,
}

impl OverlayBackend {
    /// Stack `primary` over `secondaries`, in precedence order.
    pub fn new(primary: Arc<dyn Backend>, secondaries: Vec<Arc<dyn Backend>>) -> Self {
        Self {
            primary,
            secondaries,
        }
    }

    fn layers(&self) -> impl Iterator<Item = &dyn Backend> {
        std::iter::once(self.primary.as_ref())
            .chain(self.secondaries.iter().map(Arc::as_ref))
    }

    /// Apply `op` to each layer in precedence order, returning the first
    /// hit. A layer answering `NotFound` passes the question down the
    /// chain; any other error is final.
    fn first_hit<T>(
        &self,
        id: &Identity,
        mut op: impl FnMut(&dyn Backend) -> Result<T>,
    ) -> Result<T> {
        for layer in self.layers() {
            match op(layer) {
                Ok(value) => return Ok(value),
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::NotFound(id.to_string()))
    }
}

impl Backend for OverlayBackend {
    fn module(&self) -> &str {
        self.primary.module()
    }

    fn open(&self, id: &Identity) -> Result<File> {
        self.first_hit(id, |layer| layer.open(id))
    }

    fn create(&self, id: &Identity, content: &[u8]) -> Result<()> {
        self.primary.create(id, content)
    }

    fn stat(&self, id: &Identity) -> Result<Metadata> {
        self.first_hit(id, |layer| layer.stat(id))
    }

    fn read_dir(&self, id: &Identity) -> Result<Vec<Metadata>> {
        let start = self.stat(id)?;
        if !start.is_dir {
            return Err(Error::NotADirectory(id.to_string()));
        }
        let mut merged: BTreeMap<String, Metadata> = BTreeMap::new();
        for layer in self.layers() {
            match layer.read_dir(id) {
                Ok(children) => {
                    for child in children {
                        let name = child.name().to_string();
                        merged.entry(name).or_insert(child);
                    }
                }
                // A layer without the directory, or shadowed by a file
                // higher up, contributes nothing.
                Err(Error::NotFound(_)) | Err(Error::NotADirectory(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(merged.into_values().collect())
    }

    fn walk(&self, id: &Identity) -> Result<Vec<Metadata>> {
        let start = self.stat(id)?;
        if !start.is_dir {
            return Err(Error::NotADirectory(id.to_string()));
        }
        let mut merged: BTreeMap<String, Metadata> = BTreeMap::new();
        for layer in self.layers() {
            match layer.walk(id) {
                Ok(metas) => {
                    for meta in metas {
                        let path = meta.id.path().to_string();
                        merged.entry(path).or_insert(meta);
                    }
                }
                Err(Error::NotFound(_)) | Err(Error::NotADirectory(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        merged.entry(start.id.path().to_string()).or_insert(start);
        Ok(merged.into_values().collect())
    }

    fn remove(&self, id: &Identity) -> Result<()> {
        match self.primary.remove(id) {
            Ok(()) => return Ok(()),
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        // Present only in a read-only layer: refusing is more honest than
        // pretending the removal took.
        for layer in &self.secondaries {
            if layer.stat(id).is_ok() {
                return Err(Error::ReadOnly(id.to_string()));
            }
        }
        Err(Error::NotFound(id.to_string()))
    }

    fn mkdir_all(&self, id: &Identity) -> Result<()> {
        self.primary.mkdir_all(id)
    }
}
