//! Snapshot a path and print the resulting hash

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use rvcs_core::Hash;
use rvcs_snapshot::current_with_additional_parents;

pub async fn run(path: &std::path::Path, additional_parents: &[String]) -> Result<()> {
    let store = util::open_store()?;
    let target = util::absolutize(path)?;

    let mut extra = Vec::with_capacity(additional_parents.len());
    for raw in additional_parents {
        extra.push(Hash::parse(raw)?);
    }

    match current_with_additional_parents(&store, &target, &extra)? {
        Some((hash, _)) => {
            println!("{}", hash);
        }
        None => {
            println!(
                "{}",
                format!("nothing to snapshot at {} (missing or excluded)", target).dimmed()
            );
        }
    }
    Ok(())
}
