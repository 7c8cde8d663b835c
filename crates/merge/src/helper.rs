//! External merge helper invocation
//!
//! When both sides of a path changed and neither is a directory, the
//! merger hands the three contents to an external program and takes its
//! standard output as the merged result. The helper contract: argv is the
//! configured arguments followed by the source, base, and destination
//! files; exit 0 means stdout is the merge, anything else means a human
//! has to intervene.

use crate::error::ManualMergeRequired;
use anyhow::{Context, Result};
use rvcs_core::{File, Hash, HelperFailed, ModeLine, Path, Store};
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

/// Environment variable naming the merge helper program.
pub const MERGE_HELPER_COMMAND_ENV: &str = "RVCS_MERGE_HELPER_COMMAND";
/// Environment variable holding a JSON array of extra helper arguments.
pub const MERGE_HELPER_ARGS_ENV: &str = "RVCS_MERGE_HELPER_ARGS";

/// How to run the per-file merge helper.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub helper_command: String,
    pub helper_args: Vec<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        // `-m` makes stock diff3 emit the merged file on stdout.
        Self {
            helper_command: "diff3".to_string(),
            helper_args: vec!["-m".to_string()],
        }
    }
}

impl MergeOptions {
    /// Resolve the helper configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let mut opts = Self::default();
        if let Ok(command) = std::env::var(MERGE_HELPER_COMMAND_ENV) {
            if !command.is_empty() {
                opts.helper_command = command;
                opts.helper_args = Vec::new();
            }
        }
        if let Ok(args) = std::env::var(MERGE_HELPER_ARGS_ENV) {
            opts.helper_args = serde_json::from_str(&args)
                .with_context(|| format!("{} is not a JSON array of strings", MERGE_HELPER_ARGS_ENV))?;
        }
        Ok(opts)
    }
}

/// Run the helper over the contents of `base`, `src`, and `dest` and store
/// the result as a new snapshot with `parents = [src, dest]`.
pub(crate) fn merge_with_helper(
    store: &Store,
    opts: &MergeOptions,
    sub_path: &Path,
    mode: &ModeLine,
    base: Option<&Hash>,
    src: &Hash,
    dest: &Hash,
) -> Result<Hash> {
    let src_file = materialize_contents(store, Some(src))?;
    let base_file = materialize_contents(store, base)?;
    let dest_file = materialize_contents(store, Some(dest))?;

    let output = Command::new(&opts.helper_command)
        .args(&opts.helper_args)
        .arg(src_file.path())
        .arg(base_file.path())
        .arg(dest_file.path())
        .output()
        .with_context(|| format!("failure running the merge helper {:?}", opts.helper_command))?;

    if !output.status.success() {
        let failure = HelperFailed {
            helper: opts.helper_command.clone(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        tracing::debug!("merge helper refused {}: {}", sub_path, failure);
        return Err(ManualMergeRequired::new(
            sub_path,
            format!("the merge helper refused to combine the two versions ({})", failure),
        )
        .into());
    }

    let contents = store.store_object(output.stdout.len() as u64, &output.stdout[..])?;
    let merged = File {
        mode: mode.clone(),
        contents,
        parents: vec![src.clone(), dest.clone()],
    };
    let bytes = merged.to_canonical_bytes();
    store.store_object(bytes.len() as u64, &bytes[..])
}

/// Write a snapshot's contents object to a temp file for the helper; an
/// absent snapshot becomes an empty file.
fn materialize_contents(store: &Store, hash: Option<&Hash>) -> Result<NamedTempFile> {
    let mut tmp = NamedTempFile::new().context("failure creating a merge helper input file")?;
    if let Some(hash) = hash {
        let file = store.read_snapshot(hash)?;
        let bytes = store.load_object(&file.contents)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
    }
    Ok(tmp)
}
