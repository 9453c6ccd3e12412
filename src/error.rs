//! Error types for the packaging pipeline.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for packfs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while packaging or serving embedded assets.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error, wrapped with the path it occurred on.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The address failed normalization.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// The identity is absent from the backend.
    #[error("not found: {0}")]
    NotFound(String),

    /// A write was attempted on a read-only backend.
    #[error("read-only filesystem: {0}")]
    ReadOnly(String),

    /// A directory operation hit a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file operation hit a directory.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// The source scan hit malformed syntax.
    #[error("parse error at {}:{line}:{column}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// Two entries claimed the same identity with different content.
    #[error("duplicate entry: {0}")]
    Duplicate(String),

    /// The decoder saw an archive version it does not understand.
    #[error("unsupported archive version: {0:?}")]
    UnsupportedFormat(String),

    /// The archive text is malformed, truncated, or fails its digest.
    #[error("corrupt archive: {0}")]
    Corrupt(String),

    /// The build context could not be resolved from a manifest.
    #[error("manifest error: {0}")]
    Manifest(String),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Manifest(e.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        let path = e
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<walk>".to_string());
        let source = e
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
        Error::Io { path, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_wraps_path() {
        let e = Error::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = e.to_string();
        assert!(msg.contains("/tmp/x"));
        assert!(msg.contains("gone"));
    }

    #[test]
    fn test_parse_names_location() {
        let e = Error::Parse {
            file: PathBuf::from("src/main.rs"),
            line: 7,
            column: 13,
            message: "expected `;`".to_string(),
        };
        assert!(e.to_string().contains("src/main.rs:7:13"));
    }
}
