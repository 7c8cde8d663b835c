//! Error types shared across the rvcs crates
//!
//! Operational code uses `anyhow` with context (matching the rest of the
//! codebase); the types here exist for the cases a caller has to match on,
//! dispatched via `anyhow::Error::downcast_ref`.

use crate::hash::Hash;
use thiserror::Error;

/// A string that does not parse as `<algo>:<hex>` with a known algorithm.
#[derive(Debug, Clone, Error)]
#[error("invalid hash {0:?}")]
pub struct InvalidHash(pub String);

/// A string that does not parse as `<namespace>::<contents>`.
#[derive(Debug, Clone, Error)]
#[error("invalid identity {0:?}")]
pub struct InvalidIdentity(pub String);

/// A mirror URL without a usable scheme.
#[derive(Debug, Clone, Error)]
#[error("invalid mirror url {0:?}")]
pub struct InvalidMirrorUrl(pub String);

/// The store has no object for the given hash.
#[derive(Debug, Clone, Error)]
#[error("object {0} not found in the store")]
pub struct ObjectNotFound(pub Hash);

/// A helper process exited with a non-zero status.
///
/// A helper killed by a signal is reported with status -1.
#[derive(Debug, Clone, Error)]
#[error("helper {helper} exited with status {status}: {stderr}")]
pub struct HelperFailed {
    pub helper: String,
    pub status: i32,
    pub stderr: String,
}
