//! Canonical snapshot paths
//!
//! A [`Path`] is the absolute location of a tracked filesystem node, kept
//! as a string with `/` separators so that joining a tree entry name is
//! identical on every host OS. Tree keys themselves are plain
//! single-component strings; see [`crate::tree::Tree`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// A canonical absolute filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path(String);

impl Path {
    /// Wrap an already-canonical absolute path string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Convert a standard path, normalizing `.` components lexically.
    ///
    /// The input must already be absolute; relative inputs are the CLI's
    /// job to resolve against the working directory first.
    pub fn from_std(p: &std::path::Path) -> Self {
        use std::path::Component;

        let mut parts: Vec<String> = Vec::new();
        for component in p.components() {
            match component {
                Component::RootDir | Component::Prefix(_) => {}
                Component::CurDir => {}
                Component::ParentDir => {
                    parts.pop();
                }
                Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
            }
        }
        Self(format!("/{}", parts.join("/")))
    }

    /// Append a single tree entry name using `/`.
    pub fn join(&self, name: &str) -> Self {
        if self.0.ends_with('/') {
            Self(format!("{}{}", self.0, name))
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<Path> {
        let trimmed = self.0.trim_end_matches('/');
        let idx = trimmed.rfind('/')?;
        if idx == 0 {
            if trimmed.len() > 1 {
                return Some(Path::new("/"));
            }
            return None;
        }
        Some(Path::new(&trimmed[..idx]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// View as a standard path for filesystem calls.
    pub fn as_std(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }

    /// Whether `self` equals `other` or lives underneath it.
    pub fn starts_with(&self, other: &Path) -> bool {
        self.0 == other.0 || self.0.starts_with(&format!("{}/", other.0.trim_end_matches('/')))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
