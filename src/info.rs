//! Build context resolution.
//!
//! [`Info`] is the pair every packaging run starts from: the module
//! identifier (the crate name) and the directory it is rooted at. Discovery
//! walks upward from a directory to the nearest `Cargo.toml` carrying a
//! `[package]` section, skipping virtual workspace manifests.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::MANIFEST_NAME;
use crate::error::{Error, Result};

/// The resolved build context: module identifier and root directory.
///
/// Immutable once obtained; create it once per run and thread it through
/// the resolver and the codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    /// Module identifier (the `[package].name` of the owning crate).
    pub module: String,
    /// Directory the module is rooted at.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<ManifestPackage>,
}

#[derive(Debug, Deserialize)]
struct ManifestPackage {
    name: String,
}

impl Info {
    /// Build an `Info` from already-known parts.
    pub fn new(module: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            module: module.into(),
            root: root.into(),
        }
    }

    /// Resolve the build context for the current working directory.
    pub fn current() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|e| Error::io(".", e))?;
        Self::for_dir(&cwd)
    }

    /// Resolve the build context for `dir`, walking upward until a manifest
    /// with a `[package]` section is found.
    pub fn for_dir(dir: &Path) -> Result<Self> {
        let mut cursor = Some(dir);
        while let Some(d) = cursor {
            let manifest_path = d.join(MANIFEST_NAME);
            if manifest_path.is_file() {
                let text = std::fs::read_to_string(&manifest_path)
                    .map_err(|e| Error::io(&manifest_path, e))?;
                let manifest: Manifest = toml::from_str(&text)?;
                // Virtual workspace manifests have no [package]; keep walking.
                if let Some(package) = manifest.package {
                    return Ok(Self::new(package.name, d));
                }
            }
            cursor = d.parent();
        }
        Err(Error::Manifest(format!(
            "no {} with a [package] section above {}",
            MANIFEST_NAME,
            dir.display()
        )))
    }
}
