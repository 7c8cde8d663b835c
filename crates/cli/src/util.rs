//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use rvcs_core::{Hash, Identity, InvalidHash, InvalidIdentity, InvalidMirrorUrl, Path, Store};
use rvcs_merge::{ManualMergeRequired, MergeConflicts};
use rvcs_publish::{pull, PublishOptions, Settings};
use thiserror::Error;

/// A mistake on the command line rather than an internal failure; maps to
/// exit code 1.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UserError(pub String);

/// Open the store at `$RVCS_STORE_DIR`, defaulting to `~/.rvcs`.
pub fn open_store() -> Result<Store> {
    let root = match std::env::var_os("RVCS_STORE_DIR") {
        Some(dir) => std::path::PathBuf::from(dir),
        None => dirs::home_dir()
            .context("could not determine the home directory for the default store")?
            .join(".rvcs"),
    };
    Store::open(root)
}

/// Resolve a user-supplied path against the working directory into a
/// canonical absolute snapshot path.
pub fn absolutize(path: &std::path::Path) -> Result<Path> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("failed to get the current directory")?
            .join(path)
    };
    Ok(Path::from_std(&absolute))
}

/// Interpret a merge source: a snapshot hash directly, or an identity
/// whose latest published snapshot is pulled and verified.
pub fn resolve_snapshot_ref(store: &Store, raw: &str) -> Result<Hash> {
    if let Ok(hash) = Hash::parse(raw) {
        return Ok(hash);
    }
    let identity = Identity::parse(raw).map_err(|_| {
        UserError(format!(
            "{:?} is neither a snapshot hash nor an identity",
            raw
        ))
    })?;
    let settings = Settings::load(store)?;
    let opts = PublishOptions::default();
    let (_signature, signed) = pull(store, &settings, &opts, &identity)?;
    signed.ok_or_else(|| {
        UserError(format!("no published snapshot found for {}", identity)).into()
    })
}

/// Exit code mapping: 0 success, 1 user error, 2 internal/I-O error.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    let user_error = err.downcast_ref::<MergeConflicts>().is_some()
        || err.downcast_ref::<ManualMergeRequired>().is_some()
        || err.downcast_ref::<InvalidHash>().is_some()
        || err.downcast_ref::<InvalidIdentity>().is_some()
        || err.downcast_ref::<InvalidMirrorUrl>().is_some()
        || err.downcast_ref::<UserError>().is_some();
    if user_error {
        1
    } else {
        2
    }
}
