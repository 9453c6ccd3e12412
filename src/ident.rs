//! Canonical asset addressing.
//!
//! An [`Identity`] names one packaged asset independently of the host
//! filesystem: an owning-module identifier plus a rooted, forward-slash
//! path, rendered as `module:/rel/path`. Identities are what backends,
//! declarations and archives key on; two identities are equal exactly when
//! their normalized forms match.

use serde::Serialize;

use crate::error::{Error, Result};

/// A canonical, OS-independent asset address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identity {
    module: String,
    path: String,
}

impl Identity {
    /// Parse a raw reference into a canonical identity.
    ///
    /// Accepted forms are `/rel/path` (owned by `default_module`) and
    /// `module:/rel/path`. The path part must be rooted; `.` and `..`
    /// segments, backslashes, and characters that would break the textual
    /// container (tabs, quotes, control characters) are rejected.
    pub fn parse(raw: &str, default_module: &str) -> Result<Self> {
        let (module, path) = match raw.find(':') {
            Some(idx) => (&raw[..idx], &raw[idx + 1..]),
            None => (default_module, raw),
        };
        Self::new(module, path)
    }

    /// Build an identity from an explicit module and path.
    pub fn new(module: &str, path: &str) -> Result<Self> {
        validate_module(module)?;
        let path = normalize_path(path)?;
        Ok(Self {
            module: module.to_string(),
            path,
        })
    }

    /// The owning module identifier.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The rooted, normalized path within the module.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether this addresses the module root directory.
    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Last path segment, or `/` for the root.
    pub fn name(&self) -> &str {
        match self.path.rfind('/') {
            Some(idx) if idx + 1 < self.path.len() => &self.path[idx + 1..],
            _ => "/",
        }
    }

    /// Identity of the parent directory, or `None` at the root.
    pub fn parent(&self) -> Option<Identity> {
        if self.is_root() {
            return None;
        }
        let idx = self.path.rfind('/').unwrap_or(0);
        let parent = if idx == 0 { "/" } else { &self.path[..idx] };
        Some(Identity {
            module: self.module.clone(),
            path: parent.to_string(),
        })
    }

    /// Append one segment.
    pub fn join(&self, name: &str) -> Result<Identity> {
        validate_segment(name)?;
        let path = if self.is_root() {
            format!("/{}", name)
        } else {
            format!("{}/{}", self.path, name)
        };
        Ok(Identity {
            module: self.module.clone(),
            path,
        })
    }

    /// Whether `self` equals `dir` or sits somewhere below it.
    pub fn is_under(&self, dir: &Identity) -> bool {
        if self.module != dir.module {
            return false;
        }
        if dir.is_root() {
            return true;
        }
        self.path == dir.path || self.path.starts_with(&format!("{}/", dir.path))
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.module, self.path)
    }
}

fn validate_module(module: &str) -> Result<()> {
    if module.is_empty() {
        return Err(Error::InvalidIdentity("empty module".to_string()));
    }
    for c in module.chars() {
        if c == ':' || c == '"' || c == '\\' || c.is_whitespace() || c.is_control() {
            return Err(Error::InvalidIdentity(format!(
                "module {:?} contains {:?}",
                module, c
            )));
        }
    }
    Ok(())
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(Error::InvalidIdentity(format!(
            "invalid path segment: {:?}",
            segment
        )));
    }
    for c in segment.chars() {
        if c == '/' || c == '\\' || c == '"' || c == '\t' || c.is_control() {
            return Err(Error::InvalidIdentity(format!(
                "path segment {:?} contains {:?}",
                segment, c
            )));
        }
    }
    Ok(())
}

/// Normalize a rooted path: collapse repeated slashes, drop a trailing
/// slash, reject unrooted input and invalid segments.
fn normalize_path(path: &str) -> Result<String> {
    if !path.starts_with('/') {
        return Err(Error::InvalidIdentity(format!(
            "path must be rooted (start with /): {:?}",
            path
        )));
    }

    let mut segments = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        validate_segment(segment)?;
        segments.push(segment);
    }

    if segments.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(format!("/{}", segments.join("/")))
    }
}
