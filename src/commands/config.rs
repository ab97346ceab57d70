use anyhow::{Context, Result};
use std::path::Path;

use ticketwatch::config::Config;

/// Print the effective configuration as TOML with the token redacted
pub fn show_config(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let rendered =
        toml::to_string_pretty(&config.redacted()).context("Failed to render configuration")?;

    println!("{rendered}");
    Ok(())
}
