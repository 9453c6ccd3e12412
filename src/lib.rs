//! Static assets compiled into the binary, behind a filesystem surface.
//!
//! A packaging run scans a crate's sources for references to static files,
//! reads the referenced files into a deterministic textual archive and
//! writes a generated Rust source file embedding it. At startup the
//! generated `init()` decodes the archive into an in-memory filesystem and
//! installs it process-wide, so the same `open("/...")` call that read from
//! disk during development reads from the embedded archive in the shipped
//! binary.
//!
//! # Features
//!
//! - **Uniform surface**: identical calls before and after packing
//! - **Deterministic archives**: unchanged inputs produce byte-identical output
//! - **Source scanning**: referenced assets discovered from the code itself
//! - **Single binary**: nothing to copy alongside the executable
//!
//! # Architecture
//!
//! ```text
//! pack:    Scan sources → Declarations → Read (disk) → Encode → packed.rs
//! runtime: init() → Decode → Memory backend → open()/stat()/walk()
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::io::Read;
//!
//! // Served from disk during development, from the embedded archive once
//! // the generated init() has run.
//! let mut file = packfs::open("/static/app.css").unwrap();
//! let mut css = String::new();
//! file.read_to_string(&mut css).unwrap();
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod ident;
pub mod info;
pub mod resolver;
pub mod vfs;

pub use error::{Error, Result};
pub use ident::Identity;
pub use info::Info;
pub use vfs::{mem, Backend, DiskBackend, File, MemBackend, Metadata, OverlayBackend};

use std::sync::Arc;

use once_cell::sync::OnceCell;

static ACTIVE: OnceCell<Arc<dyn Backend>> = OnceCell::new();

/// Install `backend` as the process-wide filesystem.
///
/// The first call wins and later calls are no-ops, so a generated `init()`
/// may run from several code paths without harm.
pub fn apply(backend: Arc<dyn Backend>) -> Result<()> {
    let _ = ACTIVE.set(backend);
    Ok(())
}

/// The active backend, falling back to disk passthrough over the current
/// build context when nothing was applied.
fn current() -> Result<Arc<dyn Backend>> {
    ACTIVE
        .get_or_try_init(|| -> Result<Arc<dyn Backend>> {
            Ok(Arc::new(DiskBackend::new(Info::current()?)?))
        })
        .map(Arc::clone)
}

/// Open a file for reading.
pub fn open(path: &str) -> Result<File> {
    let backend = current()?;
    let id = backend.parse(path)?;
    backend.open(&id)
}

/// Create or truncate a file.
pub fn create(path: &str, content: &[u8]) -> Result<()> {
    let backend = current()?;
    let id = backend.parse(path)?;
    backend.create(&id, content)
}

/// Stat a file or directory.
pub fn stat(path: &str) -> Result<Metadata> {
    let backend = current()?;
    let id = backend.parse(path)?;
    backend.stat(&id)
}

/// List the immediate children of a directory.
pub fn read_dir(path: &str) -> Result<Vec<Metadata>> {
    let backend = current()?;
    let id = backend.parse(path)?;
    backend.read_dir(&id)
}

/// Walk a directory subtree depth-first.
pub fn walk(path: &str) -> Result<Vec<Metadata>> {
    let backend = current()?;
    let id = backend.parse(path)?;
    backend.walk(&id)
}

/// Remove a file or directory subtree.
pub fn remove(path: &str) -> Result<()> {
    let backend = current()?;
    let id = backend.parse(path)?;
    backend.remove(&id)
}

/// Create a directory and its missing ancestors.
pub fn mkdir_all(path: &str) -> Result<()> {
    let backend = current()?;
    let id = backend.parse(path)?;
    backend.mkdir_all(&id)
}

/// Mark a file or directory for embedding without reading it.
///
/// At runtime this only canonicalizes `path` against the active module and
/// returns the identity; its purpose is to be seen by the packaging scan,
/// which embeds the named tree.
pub fn include(path: &str) -> Result<Identity> {
    let backend = current()?;
    backend.parse(path)
}
