//! Snapshot, sign, and push a path under an identity

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use rvcs_core::Identity;
use rvcs_publish::{push, sign, PublishOptions, Settings};
use rvcs_snapshot::current;

pub async fn run(path: &std::path::Path, identity: &str) -> Result<()> {
    let store = util::open_store()?;
    let id = Identity::parse(identity)?;
    let target = util::absolutize(path)?;

    // 1. Snapshot the path
    let Some((hash, _)) = current(&store, &target)? else {
        return Err(util::UserError(format!("nothing to publish at {}", target)).into());
    };

    // 2. Sign it, chaining from the previous signature if there is one
    let opts = PublishOptions::default();
    let prev = store.latest_signature_for_identity(&id)?;
    let signature = sign(&store, &opts, &id, &hash, prev.as_ref())?;
    println!(
        "{} Signed {} as {}",
        "✓".green(),
        hash.short().yellow(),
        id.to_string().cyan()
    );

    // 3. Push the signature to every configured mirror
    let settings = Settings::load(&store)?;
    let report = push(&settings, &opts, &id, &signature)?;
    for url in &report.succeeded {
        println!("  {} pushed to {}", "✓".green(), url.bright_blue());
    }
    for (url, err) in &report.failed {
        println!("  {} push to {} failed: {}", "!".yellow(), url.bright_blue(), err);
    }
    if report.is_empty() {
        println!("{}", "  (no push mirrors configured)".dimmed());
    }
    Ok(())
}
