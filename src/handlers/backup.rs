//! `backup` command handler

use anyhow::Result;
use colored::Colorize;

use crate::backup::{self, BackupOutcome};
use crate::config::Config;
use crate::scm::CommitOutcome;

/// One-line summary of a finished backup
pub fn describe_outcome(outcome: &BackupOutcome) -> String {
    match outcome {
        BackupOutcome::StoredLocally => "Backup stored locally".to_string(),
        BackupOutcome::NoChanges => "No new commits since last backup".to_string(),
        BackupOutcome::Grouped {
            commit: CommitOutcome::NoChanges,
            ..
        } => "Model unchanged, nothing committed".to_string(),
        BackupOutcome::Grouped { latest, .. } => match latest {
            Some(latest) => format!("Pushed grouped backup commit dated {latest}"),
            None => "Pushed grouped backup commit".to_string(),
        },
        BackupOutcome::Exact { committed, skipped } => {
            format!("Pushed {committed} commit(s), skipped {skipped} activity(ies)")
        }
    }
}

/// Handle `backup`
pub fn handle_backup() -> Result<()> {
    let config = Config::from_env()?;
    let outcome = backup::backup(&config)?;

    let summary = describe_outcome(&outcome);
    match outcome {
        BackupOutcome::NoChanges
        | BackupOutcome::Grouped {
            commit: CommitOutcome::NoChanges,
            ..
        } => println!("{} {}", "✓".yellow(), summary.yellow()),
        _ => println!("{} {}", "✓".green(), summary.green()),
    }
    Ok(())
}
