//! Register a mirror for an identity

use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;
use rvcs_core::{Identity, Mirror};
use rvcs_publish::Settings;

pub async fn run(identity: &str, url: &str, read_only: bool) -> Result<()> {
    let store = util::open_store()?;
    let id = Identity::parse(identity)?;
    let mirror = Mirror::parse(url)?;

    let mut settings = Settings::load(&store)?;
    settings.add_mirror(&id, mirror, read_only);
    settings.save(&store)?;

    let kind = if read_only { " (read-only)" } else { "" };
    println!(
        "{} Added mirror for {}: {}{}",
        "✓".green(),
        id.to_string().cyan(),
        url.bright_blue(),
        kind.dimmed()
    );
    Ok(())
}
