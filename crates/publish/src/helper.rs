//! Helper process invocation shared by sign, verify, pull, and push
//!
//! The contract is fixed: helpers are found on `PATH` (or under an
//! explicitly configured directory), arguments are positional, stdout is
//! read fully and parsed as a single hash, and any non-zero exit is a
//! failure.

use anyhow::{Context, Result};
use rvcs_core::{Hash, HelperFailed};
use std::path::PathBuf;
use std::process::Command;

/// How publish operations locate their helper binaries.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// When set, helper names resolve to `<helper_dir>/<name>` instead of
    /// being looked up on `PATH`.
    pub helper_dir: Option<PathBuf>,
}

impl PublishOptions {
    fn program(&self, name: &str) -> PathBuf {
        match &self.helper_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}

/// Run a helper and parse its stdout as a hash.
pub(crate) fn run_helper(opts: &PublishOptions, name: &str, args: &[String]) -> Result<Hash> {
    let output = run_helper_raw(opts, name, args)?;
    let text = String::from_utf8_lossy(&output);
    Hash::parse(&text)
        .with_context(|| format!("failure parsing the stdout of the helper {:?}", name))
}

/// Run a helper for its side effects only; stdout is returned unparsed.
pub(crate) fn run_helper_raw(
    opts: &PublishOptions,
    name: &str,
    args: &[String],
) -> Result<Vec<u8>> {
    let output = Command::new(opts.program(name))
        .args(args)
        .output()
        .with_context(|| format!("failure running the helper {:?}", name))?;
    if !output.status.success() {
        return Err(HelperFailed {
            helper: name.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
        .into());
    }
    Ok(output.stdout)
}
