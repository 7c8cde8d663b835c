//! Merge a snapshot into a destination path

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use rvcs_merge::{merge, MergeOptions};

pub async fn run(src: &str, dest: &std::path::Path) -> Result<()> {
    let store = util::open_store()?;
    let opts = MergeOptions::from_env()?;
    let dest_path = util::absolutize(dest)?;

    let src_hash = util::resolve_snapshot_ref(&store, src)?;
    merge(&store, &opts, &src_hash, &dest_path)?;

    println!(
        "{} Merged {} into {}",
        "✓".green(),
        src_hash.short().yellow(),
        dest_path.to_string().cyan()
    );
    Ok(())
}
