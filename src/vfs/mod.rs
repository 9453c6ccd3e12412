//! Filesystem backends and the uniform access surface over them.
//!
//! A [`Backend`] answers path lookups for exactly one module: the in-memory
//! backend serves unpacked archive entries, the disk backend passes through
//! to the host filesystem under a module root, and the overlay stacks one
//! writable layer over read-only ones. Callers address everything by
//! [`Identity`] and get back [`File`] handles and [`Metadata`] that look the
//! same regardless of which backend answered.

pub mod disk;
pub mod mem;
pub mod overlay;

pub use disk::DiskBackend;
pub use mem::MemBackend;
pub use overlay::OverlayBackend;

use std::io;
use std::sync::Arc;

use crate::error::Result;
use crate::ident::Identity;

/// Stat information for a filesystem object, identical across backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Canonical address of the object.
    pub id: Identity,
    /// Content length in bytes; zero for directories.
    pub size: u64,
    /// Permission bits (no file-type bits).
    pub mode: u32,
    /// Modification time, unix seconds.
    pub mtime: u64,
    /// Whether the object is a directory.
    pub is_dir: bool,
}

impl Metadata {
    /// Base name of the object, `/` for a module root.
    pub fn name(&self) -> &str {
        self.id.name()
    }
}

/// An open file handle with its content fully resolved.
///
/// Reads are served from an in-memory copy regardless of backend, so a
/// handle stays valid after the backing store changes.
#[derive(Debug)]
pub struct File {
    meta: Metadata,
    data: Vec<u8>,
    pos: usize,
}

impl File {
    pub(crate) fn new(meta: Metadata, data: Vec<u8>) -> Self {
        Self { meta, data, pos: 0 }
    }

    /// Stat information captured when the file was opened.
    pub fn metadata(&self) -> &Metadata {
        &self.meta
    }

    /// Identity the file was opened under.
    pub fn id(&self) -> &Identity {
        &self.meta.id
    }

    /// The full content, ignoring the read position.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl io::Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// A filesystem scoped to one module.
///
/// All paths are [`Identity`] values; an identity naming a different module
/// than [`Backend::module`] is reported as not found rather than resolved
/// against a foreign tree.
pub trait Backend: Send + Sync {
    /// The module this backend serves.
    fn module(&self) -> &str;

    /// Parse a raw declaration against this backend's module.
    fn parse(&self, raw: &str) -> Result<Identity> {
        Identity::parse(raw, self.module())
    }

    /// Open a file for reading.
    ///
    /// Opening a directory is an error; use [`Backend::read_dir`] or
    /// [`Backend::walk`] instead.
    fn open(&self, id: &Identity) -> Result<File>;

    /// Create or truncate a file with the given content, creating missing
    /// parent directories. Read-only backends refuse with
    /// [`Error::ReadOnly`](crate::error::Error::ReadOnly).
    fn create(&self, id: &Identity, content: &[u8]) -> Result<()>;

    /// Stat a file or directory without opening it.
    fn stat(&self, id: &Identity) -> Result<Metadata>;

    /// List the immediate children of a directory, sorted by name.
    fn read_dir(&self, id: &Identity) -> Result<Vec<Metadata>>;

    /// Depth-first walk of a directory subtree.
    ///
    /// Yields the starting directory first, then every descendant in
    /// lexicographic identity order.
    fn walk(&self, id: &Identity) -> Result<Vec<Metadata>>;

    /// Remove a file, or a directory together with its contents.
    fn remove(&self, id: &Identity) -> Result<()>;

    /// Create a directory and any missing ancestors.
    fn mkdir_all(&self, id: &Identity) -> Result<()>;
}

impl<T: Backend + ?Sized> Backend for Arc<T> {
    fn module(&self) -> &str {
        (**self).module()
    }

    fn open(&self, id: &Identity) -> Result<File> {
        (**self).open(id)
    }

    fn create(&self, id: &Identity, content: &[u8]) -> Result<()> {
        (**self).create(id, content)
    }

    fn stat(&self, id: &Identity) -> Result<Metadata> {
        (**self).stat(id)
    }

    fn read_dir(&self, id: &Identity) -> Result<Vec<Metadata>> {
        (**self).read_dir(id)
    }

    fn walk(&self, id: &Identity) -> Result<Vec<Metadata>> {
        (**self).walk(id)
    }

    fn remove(&self, id: &Identity) -> Result<()> {
        (**self).remove(id)
    }

    fn mkdir_all(&self, id: &Identity) -> Result<()> {
        (**self).mkdir_all(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn meta(path: &str, size: u64, is_dir: bool) -> Metadata {
        Metadata {
            id: Identity::parse(path, "demo").unwrap(),
            size,
            mode: if is_dir { 0o755 } else { 0o644 },
            mtime: 0,
            is_dir,
        }
    }

    #[test]
    fn test_file_read_to_end() {
        let mut file = File::new(meta("/a.txt", 5, false), b"hello".to_vec());
        let mut buf = String::new();
        file.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn test_file_partial_reads() {
        let mut file = File::new(meta("/a.txt", 5, false), b"hello".to_vec());
        let mut buf = [0u8; 2];
        assert_eq!(file.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"he");
        assert_eq!(file.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ll");
        assert_eq!(file.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'o');
        assert_eq!(file.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_metadata_name() {
        assert_eq!(meta("/a/b.txt", 0, false).name(), "b.txt");
        assert_eq!(meta("/", 0, true).name(), "/");
    }
}
