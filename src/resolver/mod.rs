//! Declaration resolver: find every asset a source tree references.
//!
//! The resolver walks a module's source files, extracts include-style calls
//! through the syntax front end in [`scan`], validates each referenced
//! identity against a filesystem backend, folds in an explicit include list,
//! and hands the codec a deduplicated, canonically ordered declaration set.

mod scan;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::config::{ARTIFACT_NAME, EXCLUDED_DIRS};
use crate::error::{Error, Result};
use crate::ident::Identity;
use crate::info::Info;
use crate::vfs::Backend;

use scan::ScanArg;

/// Where a scanned declaration was found, relative to the module root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// A discovered reference to an identity.
#[derive(Debug, Clone, Serialize)]
pub struct Declaration {
    /// The referenced asset, canonicalized.
    pub id: Identity,
    /// Call site for scanned declarations; `None` for explicit includes.
    pub location: Option<SourceLocation>,
    /// The call expression (or include string) that produced the reference.
    pub expr: String,
}

/// A call the scanner matched but could not resolve statically.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub location: SourceLocation,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// The outcome of one resolve pass.
#[derive(Debug, Serialize)]
pub struct Resolution {
    /// Unique declarations, sorted by canonical identity.
    pub decls: Vec<Declaration>,
    /// Computed-argument call sites, in scan order.
    pub warnings: Vec<Warning>,
}

/// Scan `info.root` for asset references and validate each against
/// `backend`, folding in the explicit `includes` list.
///
/// Scanned directory references stay single declarations (the codec embeds
/// their subtree); explicit include directories expand to their descendant
/// files here. A referenced identity missing from the backend is a hard
/// [`Error::NotFound`] naming it.
pub fn resolve(info: &Info, backend: &dyn Backend, includes: &[String]) -> Result<Resolution> {
    let mut decls: BTreeMap<Identity, Declaration> = BTreeMap::new();
    let mut warnings = Vec::new();

    for path in source_files(info)? {
        let text = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        let rel = location_path(info, &path);
        for hit in scan::scan_file(&rel, &text)? {
            let location = SourceLocation {
                file: rel.clone(),
                line: hit.line,
                column: hit.column,
            };
            match hit.arg {
                ScanArg::Literal(raw) => {
                    let id = backend.parse(&raw)?;
                    backend.stat(&id)?;
                    decls.entry(id.clone()).or_insert(Declaration {
                        id,
                        location: Some(location),
                        expr: hit.expr,
                    });
                }
                ScanArg::Computed => warnings.push(Warning {
                    location,
                    message: format!("cannot resolve `{}` statically", hit.expr),
                }),
            }
        }
    }

    for include in includes {
        let id = backend.parse(include)?;
        let meta = backend.stat(&id)?;
        if meta.is_dir {
            for descendant in backend.walk(&id)? {
                if descendant.is_dir {
                    continue;
                }
                decls
                    .entry(descendant.id.clone())
                    .or_insert(Declaration {
                        id: descendant.id.clone(),
                        location: None,
                        expr: include.clone(),
                    });
            }
        } else {
            decls.entry(id.clone()).or_insert(Declaration {
                id,
                location: None,
                expr: include.clone(),
            });
        }
    }

    Ok(Resolution {
        decls: decls.into_values().collect(),
        warnings,
    })
}

/// The source files a scan pass visits, in deterministic order.
///
/// Hidden and vendor-style directories are pruned; hidden files, non-Rust
/// files and a previously generated artifact are skipped.
fn source_files(info: &Info) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(&info.root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !excluded_dir(e));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name == ARTIFACT_NAME {
            continue;
        }
        if entry.path().extension().map_or(true, |ext| ext != "rs") {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

fn excluded_dir(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() || entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_ref())
}

fn location_path(info: &Info, path: &Path) -> PathBuf {
    path.strip_prefix(&info.root)
        .unwrap_or(path)
        .to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::DiskBackend;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> (TempDir, Info) {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "src/main.rs",
            "fn main() {\n    let _ = packfs::open(\"/static/app.css\");\n}\n",
        );
        write(dir.path(), "static/app.css", "body{}");
        write(dir.path(), "assets/logo.svg", "<svg/>");
        write(dir.path(), "assets/notes/readme.txt", "hi");
        let info = Info::new("demo", dir.path());
        (dir, info)
    }

    fn backend(info: &Info) -> DiskBackend {
        DiskBackend::new(info.clone()).unwrap()
    }

    #[test]
    fn test_scanned_literal_becomes_declaration() {
        let (_dir, info) = fixture();
        let resolution = resolve(&info, &backend(&info), &[]).unwrap();
        assert_eq!(resolution.decls.len(), 1);
        let decl = &resolution.decls[0];
        assert_eq!(decl.id.to_string(), "demo:/static/app.css");
        assert_eq!(decl.expr, "packfs::open(\"/static/app.css\")");
        let loc = decl.location.as_ref().unwrap();
        assert_eq!(loc.file, PathBuf::from("src/main.rs"));
        assert_eq!(loc.line, 2);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_include_directory_expands_to_files() {
        let (_dir, info) = fixture();
        let resolution =
            resolve(&info, &backend(&info), &["/assets".to_string()]).unwrap();
        let ids: Vec<String> = resolution.decls.iter().map(|d| d.id.to_string()).collect();
        assert_eq!(
            ids,
            [
                "demo:/assets/logo.svg",
                "demo:/assets/notes/readme.txt",
                "demo:/static/app.css",
            ]
        );
        let include = resolution
            .decls
            .iter()
            .find(|d| d.id.to_string() == "demo:/assets/logo.svg")
            .unwrap();
        assert!(include.location.is_none());
        assert_eq!(include.expr, "/assets");
    }

    #[test]
    fn test_duplicate_references_first_sighting_wins() {
        let (dir, info) = fixture();
        write(
            dir.path(),
            "src/extra.rs",
            "pub fn f() {\n    let _ = open(\"/static/app.css\");\n}\n",
        );
        let resolution = resolve(&info, &backend(&info), &[]).unwrap();
        assert_eq!(resolution.decls.len(), 1);
        // `src/extra.rs` sorts before `src/main.rs`.
        assert_eq!(
            resolution.decls[0].location.as_ref().unwrap().file,
            PathBuf::from("src/extra.rs")
        );
    }

    #[test]
    fn test_computed_argument_becomes_warning() {
        let (dir, info) = fixture();
        write(
            dir.path(),
            "src/dynamic.rs",
            "pub fn f(name: &str) {\n    let _ = packfs::open(name);\n}\n",
        );
        let resolution = resolve(&info, &backend(&info), &[]).unwrap();
        assert_eq!(resolution.warnings.len(), 1);
        let warning = &resolution.warnings[0];
        assert_eq!(warning.location.file, PathBuf::from("src/dynamic.rs"));
        assert!(warning.message.contains("packfs::open(name)"));
        assert_eq!(resolution.decls.len(), 1);
    }

    #[test]
    fn test_missing_reference_is_hard_error() {
        let (dir, info) = fixture();
        write(
            dir.path(),
            "src/broken.rs",
            "pub fn f() {\n    let _ = open(\"/no/such/file\");\n}\n",
        );
        let err = resolve(&info, &backend(&info), &[]).unwrap_err();
        match err {
            Error::NotFound(id) => assert_eq!(id, "demo:/no/such/file"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_include_is_hard_error() {
        let (_dir, info) = fixture();
        let err = resolve(&info, &backend(&info), &["/nope".to_string()]).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_scanned_directory_stays_single_declaration() {
        let (dir, info) = fixture();
        write(
            dir.path(),
            "src/dirs.rs",
            "pub fn f() {\n    let _ = walk(\"/assets\");\n}\n",
        );
        let resolution = resolve(&info, &backend(&info), &[]).unwrap();
        let ids: Vec<String> = resolution.decls.iter().map(|d| d.id.to_string()).collect();
        assert_eq!(ids, ["demo:/assets", "demo:/static/app.css"]);
    }

    #[test]
    fn test_hidden_and_vendor_sources_skipped() {
        let (dir, info) = fixture();
        write(
            dir.path(),
            "target/gen.rs",
            "pub fn f() { open(\"/never/scanned\"); }\n",
        );
        write(
            dir.path(),
            ".hidden/gen.rs",
            "pub fn f() { open(\"/never/scanned\"); }\n",
        );
        write(dir.path(), "src/.secret.rs", "pub fn f() { open(\"/never/scanned\"); }\n");
        let resolution = resolve(&info, &backend(&info), &[]).unwrap();
        assert_eq!(resolution.decls.len(), 1);
    }

    #[test]
    fn test_generated_artifact_not_rescanned() {
        let (dir, info) = fixture();
        write(
            dir.path(),
            "src/packed.rs",
            "pub fn f() { open(\"/never/scanned\"); }\n",
        );
        let resolution = resolve(&info, &backend(&info), &[]).unwrap();
        assert_eq!(resolution.decls.len(), 1);
    }

    #[test]
    fn test_unparseable_source_is_parse_error() {
        let (dir, info) = fixture();
        write(dir.path(), "src/broken.rs", "fn broken( {\n");
        let err = resolve(&info, &backend(&info), &[]).unwrap_err();
        match err {
            Error::Parse { file, .. } => assert_eq!(file, PathBuf::from("src/broken.rs")),
            other => panic!("expected Parse, got {:?}", other),
        }
    }
}
