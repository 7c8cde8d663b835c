//! Identities and mirrors
//!
//! An identity names a signer; its namespace selects which
//! `rvcs-sign-<ns>` / `rvcs-verify-<ns>` helpers are invoked. A mirror is
//! a URL whose scheme selects the `rvcs-pull-<scheme>` /
//! `rvcs-push-<scheme>` helper pair. Both therefore get spliced into
//! command names and are validated accordingly.

use crate::error::{InvalidIdentity, InvalidMirrorUrl};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A signing identity of the form `<namespace>::<contents>`.
///
/// The namespace is restricted to `[A-Za-z0-9_-]+`; the contents are
/// opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    namespace: String,
    contents: String,
}

impl Identity {
    /// Split at the first `::` and validate the namespace.
    pub fn parse(s: &str) -> Result<Self, InvalidIdentity> {
        let (namespace, contents) = s
            .split_once("::")
            .ok_or_else(|| InvalidIdentity(s.to_string()))?;
        if namespace.is_empty()
            || !namespace
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(InvalidIdentity(s.to_string()));
        }
        Ok(Self {
            namespace: namespace.to_string(),
            contents: contents.to_string(),
        })
    }

    /// The helper-selecting namespace, safe to embed in a command name.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn contents(&self) -> &str {
        &self.contents
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.namespace, self.contents)
    }
}

/// A synchronization target for published signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub url: String,
    /// Extra arguments passed to the helper before the positional ones.
    #[serde(default)]
    pub helper_flags: Vec<String>,
}

impl Mirror {
    /// Validate that the URL carries a scheme usable as a helper suffix.
    pub fn parse(url: &str) -> Result<Self, InvalidMirrorUrl> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| InvalidMirrorUrl(url.to_string()))?;
        let valid = !scheme.is_empty()
            && scheme.as_bytes()[0].is_ascii_lowercase()
            && scheme
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'+' | b'.' | b'-'));
        if !valid || rest.is_empty() {
            return Err(InvalidMirrorUrl(url.to_string()));
        }
        Ok(Self {
            url: url.to_string(),
            helper_flags: Vec::new(),
        })
    }

    /// The helper-selecting scheme, e.g. `sftp` in `sftp://host/dir`.
    pub fn scheme(&self) -> &str {
        self.url.split_once("://").map(|(s, _)| s).unwrap_or("")
    }
}

impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
