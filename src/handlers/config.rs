//! `show-config` command handler

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;

use crate::config::Config;

/// Output format of `show-config`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    Toml,
    Json,
}

/// Render the effective configuration. Passwords are never included.
pub fn render_config(config: &Config, format: ConfigFormat) -> Result<String> {
    match format {
        ConfigFormat::Toml => {
            toml::to_string_pretty(config).context("Failed to render configuration as TOML")
        }
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).context("Failed to render configuration as JSON")
        }
    }
}

/// Handle `show-config`
pub fn handle_show_config(format: ConfigFormat) -> Result<()> {
    let config = Config::from_env()?;
    let rendered = render_config(&config, format)?;

    if format == ConfigFormat::Toml {
        println!("{}", "Effective Configuration".cyan().bold());
        println!("{}", "=".repeat(80).cyan());
    }
    println!("{rendered}");
    Ok(())
}
