//! Display the snapshot history of a path

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use rvcs_snapshot::read_log;

pub async fn run(path: &std::path::Path, limit: Option<usize>) -> Result<()> {
    let store = util::open_store()?;
    let target = util::absolutize(path)?;

    let Some((head, _)) = store.find_snapshot(&target)? else {
        println!("{}", "No snapshots yet for this path".dimmed());
        println!();
        println!(
            "{}",
            "Tip: create one with 'rvcs snapshot <path>'".dimmed()
        );
        return Ok(());
    };

    let limit = limit.unwrap_or(20);
    let entries = read_log(&store, &head, limit as i64)?;

    println!("{} {}", "History of".bold(), target);
    println!();
    for entry in &entries {
        print!("{} ", entry.hash.short().yellow());
        print!("{} ", entry.file.mode.as_str().dimmed());
        match entry.file.parents.len() {
            0 => println!("{}", "initial".cyan()),
            1 => println!(),
            n => println!("{}", format!("merge of {} parents", n).cyan()),
        }
    }

    if entries.len() == limit {
        println!();
        println!(
            "{}",
            format!(
                "Showing the first {} entries; use --limit to see more",
                limit
            )
            .dimmed()
        );
    }
    Ok(())
}
