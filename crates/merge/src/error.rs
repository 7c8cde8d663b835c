//! Merge conflict reporting

use rvcs_core::Path;
use std::fmt;
use thiserror::Error;

/// A single spot where the automatic merge refuses to choose a side.
#[derive(Debug, Clone, Error)]
#[error("manual merge required for {path}: {reason}")]
pub struct ManualMergeRequired {
    pub path: Path,
    pub reason: String,
}

impl ManualMergeRequired {
    pub fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}

/// Every conflict found across a merged tree, reported jointly.
#[derive(Debug, Clone)]
pub struct MergeConflicts(pub Vec<ManualMergeRequired>);

impl fmt::Display for MergeConflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, conflict) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", conflict)?;
        }
        Ok(())
    }
}

impl std::error::Error for MergeConflicts {}
