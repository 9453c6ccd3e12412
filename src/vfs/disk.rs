//! Disk backend: passthrough to the host filesystem under a module root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::ident::Identity;
use crate::info::Info;
use crate::vfs::{Backend, File, Metadata};

/// A backend resolving identities against a module's source tree on disk.
///
/// During development this serves the real files that a packaging run would
/// embed, so code reads identically before and after packing.
pub struct DiskBackend {
    info: Info,
    root_id: Identity,
}

impl DiskBackend {
    /// Create a backend rooted at `info.root`, serving `info.module`.
    pub fn new(info: Info) -> Result<Self> {
        let root_id = Identity::new(&info.module, "/")?;
        Ok(Self { info, root_id })
    }

    /// The module description this backend serves.
    pub fn info(&self) -> &Info {
        &self.info
    }

    /// The host path an identity resolves to.
    pub fn host_path(&self, id: &Identity) -> PathBuf {
        let rel = id.path().trim_start_matches('/');
        if rel.is_empty() {
            self.info.root.clone()
        } else {
            self.info.root.join(rel)
        }
    }

    fn check_module(&self, id: &Identity) -> Result<()> {
        if id.module() != self.info.module {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn identity_for(&self, host: &Path) -> Result<Identity> {
        let rel = host
            .strip_prefix(&self.info.root)
            .map_err(|_| Error::NotFound(host.display().to_string()))?;
        let mut id = self.root_id.clone();
        for component in rel.components() {
            let name = component.as_os_str().to_str().ok_or_else(|| {
                Error::InvalidIdentity(format!("non UTF-8 path: {}", host.display()))
            })?;
            id = id.join(name)?;
        }
        Ok(id)
    }
}

impl Backend for DiskBackend {
    fn module(&self) -> &str {
        &self.info.module
    }

    fn open(&self, id: &Identity) -> Result<File> {
        let meta = self.stat(id)?;
        if meta.is_dir {
            return Err(Error::NotAFile(id.to_string()));
        }
        let path = self.host_path(id);
        let data = fs::read(&path).map_err(|e| io_err(id, &path, e))?;
        Ok(File::new(meta, data))
    }

    fn create(&self, id: &Identity, content: &[u8]) -> Result<()> {
        self.check_module(id)?;
        let path = self.host_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&path, content).map_err(|e| Error::io(&path, e))
    }

    fn stat(&self, id: &Identity) -> Result<Metadata> {
        self.check_module(id)?;
        let path = self.host_path(id);
        let meta = fs::metadata(&path).map_err(|e| io_err(id, &path, e))?;
        Ok(metadata_for(id.clone(), &meta))
    }

    fn read_dir(&self, id: &Identity) -> Result<Vec<Metadata>> {
        let dir_meta = self.stat(id)?;
        if !dir_meta.is_dir {
            return Err(Error::NotADirectory(id.to_string()));
        }
        let dir = self.host_path(id);
        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))? {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let name = entry.file_name().into_string().map_err(|raw| {
                Error::InvalidIdentity(format!("non UTF-8 file name: {:?}", raw))
            })?;
            names.push(name);
        }
        names.sort();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            out.push(self.stat(&id.join(&name)?)?);
        }
        Ok(out)
    }

    fn walk(&self, id: &Identity) -> Result<Vec<Metadata>> {
        let start = self.stat(id)?;
        if !start.is_dir {
            return Err(Error::NotADirectory(id.to_string()));
        }
        let dir = self.host_path(id);
        let mut out = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry?;
            let entry_id = self.identity_for(entry.path())?;
            let meta = fs::metadata(entry.path()).map_err(|e| Error::io(entry.path(), e))?;
            out.push(metadata_for(entry_id, &meta));
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    fn remove(&self, id: &Identity) -> Result<()> {
        let meta = self.stat(id)?;
        let path = self.host_path(id);
        if meta.is_dir {
            fs::remove_dir_all(&path).map_err(|e| Error::io(&path, e))
        } else {
            fs::remove_file(&path).map_err(|e| Error::io(&path, e))
        }
    }

    fn mkdir_all(&self, id: &Identity) -> Result<()> {
        self.check_module(id)?;
        let path = self.host_path(id);
        fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))
    }
}

fn io_err(id: &Identity, path: &Path, source: io::Error) -> Error {
    if source.kind() == io::ErrorKind::NotFound {
        Error::NotFound(id.to_string())
    } else {
        Error::io(path, source)
    }
}

fn metadata_for(id: Identity, meta: &fs::Metadata) -> Metadata {
    Metadata {
        id,
        size: if meta.is_dir() { 0 } else { meta.len() },
        mode: mode_of(meta),
        mtime: mtime_of(meta),
        is_dir: meta.is_dir(),
    }
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        crate::config::DEFAULT_DIR_MODE
    } else {
        crate::config::DEFAULT_FILE_MODE
    }
}

fn mtime_of(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, DiskBackend) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("public/css")).unwrap();
        fs::write(dir.path().join("public/index.html"), "<html>").unwrap();
        fs::write(dir.path().join("public/css/site.css"), "body{}").unwrap();
        fs::write(dir.path().join("top.txt"), "top").unwrap();
        let info = Info::new("demo", dir.path());
        let backend = DiskBackend::new(info).unwrap();
        (dir, backend)
    }

    fn id(path: &str) -> Identity {
        Identity::parse(path, "demo").unwrap()
    }

    #[test]
    fn test_open_reads_host_file() {
        let (_dir, backend) = fixture();
        let mut file = backend.open(&id("/public/index.html")).unwrap();
        let mut buf = String::new();
        file.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "<html>");
        assert_eq!(file.metadata().size, 6);
    }

    #[test]
    fn test_open_missing_is_not_found() {
        let (_dir, backend) = fixture();
        assert!(matches!(
            backend.open(&id("/missing.txt")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_open_directory_fails() {
        let (_dir, backend) = fixture();
        assert!(matches!(
            backend.open(&id("/public")),
            Err(Error::NotAFile(_))
        ));
    }

    #[test]
    fn test_stat_root() {
        let (_dir, backend) = fixture();
        let meta = backend.stat(&id("/")).unwrap();
        assert!(meta.is_dir);
        assert!(meta.id.is_root());
    }

    #[test]
    fn test_foreign_module_is_not_found() {
        let (_dir, backend) = fixture();
        let foreign = Identity::parse("other:/top.txt", "demo").unwrap();
        assert!(matches!(backend.stat(&foreign), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_read_dir_sorted() {
        let (_dir, backend) = fixture();
        let children = backend.read_dir(&id("/public")).unwrap();
        let names: Vec<&str> = children.iter().map(Metadata::name).collect();
        assert_eq!(names, ["css", "index.html"]);
    }

    #[test]
    fn test_walk_yields_identity_order() {
        let (_dir, backend) = fixture();
        let metas = backend.walk(&id("/")).unwrap();
        let paths: Vec<&str> = metas.iter().map(|m| m.id.path()).collect();
        assert_eq!(
            paths,
            [
                "/",
                "/public",
                "/public/css",
                "/public/css/site.css",
                "/public/index.html",
                "/top.txt",
            ]
        );
    }

    #[test]
    fn test_create_and_remove() {
        let (dir, backend) = fixture();
        backend.create(&id("/new/file.bin"), b"xyz").unwrap();
        assert!(dir.path().join("new/file.bin").is_file());
        backend.remove(&id("/new")).unwrap();
        assert!(!dir.path().join("new").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_mode_passthrough() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, backend) = fixture();
        fs::set_permissions(
            dir.path().join("top.txt"),
            fs::Permissions::from_mode(0o600),
        )
        .unwrap();
        assert_eq!(backend.stat(&id("/top.txt")).unwrap().mode, 0o600);
    }
}
