//! `export` command handler

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;
use crate::export;

/// Handle `export`
pub fn handle_export() -> Result<()> {
    let config = Config::from_env()?;
    export::export(&config)?;

    println!(
        "{} {}",
        "✓".green(),
        format!(
            "Exported model to project '{}' in repository '{}'",
            config.t4c.project_name, config.t4c.repo_name
        )
        .green()
    );
    Ok(())
}
