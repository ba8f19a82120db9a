pub mod config;
pub mod plan;
pub mod serve;
pub mod sync;

use anyhow::Context;
use monthgate_core::{Config, Directory};
use monthgate_discord::{DiscordConfig, DiscordDirectory};
use std::path::Path;
use std::sync::Arc;

/// Load and validate the config. Any error here stops the process before
/// a reconciliation can be scheduled.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

pub fn discord_directory(config: &Config, token: &str) -> anyhow::Result<Arc<dyn Directory>> {
    let discord = DiscordConfig::from_config(config, token).context("invalid Discord settings")?;
    let directory = DiscordDirectory::new(discord).context("failed to set up Discord client")?;
    Ok(Arc::new(directory))
}
