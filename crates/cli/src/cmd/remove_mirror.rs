//! Remove a mirror from an identity

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use rvcs_core::Identity;
use rvcs_publish::Settings;

pub async fn run(identity: &str, url: &str) -> Result<()> {
    let store = util::open_store()?;
    let id = Identity::parse(identity)?;

    let mut settings = Settings::load(&store)?;
    if !settings.remove_mirror(&id, url) {
        return Err(util::UserError(format!(
            "no mirror {} configured for {}",
            url, id
        ))
        .into());
    }
    settings.save(&store)?;

    println!(
        "{} Removed mirror for {}: {}",
        "✓".green(),
        id.to_string().cyan(),
        url.bright_blue()
    );
    Ok(())
}
