//! TeamForCapella commit history exported next to the project archive.
//!
//! The importer writes the activities of the requested time window to
//! `CommitHistory__<timestamp>.json` and, depending on the release,
//! `CommitHistory__<timestamp>.activitymetadata`. Both describe the same
//! records: who changed the project, when, and with which description.

mod activitymetadata;
mod json;
mod types;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use std::fs;
use std::path::Path;

pub use types::{parse_t4c_datetime, CommitHistoryEntry, IMPORT_NOISE_MARKER};

use crate::error::DiscoveryError;
use crate::workspace::find_single_t4c_file;

/// File name prefix of the exported commit history
pub const COMMIT_HISTORY_PREFIX: &str = "CommitHistory_";

const JSON_EXTENSION: &str = "json";
const ACTIVITYMETADATA_EXTENSION: &str = "activitymetadata";

/// Load the user activities exported into `project_dir`, in file order.
///
/// The JSON export is preferred; the XML export is used when no JSON file was
/// written. Import bookkeeping entries are already filtered out.
pub fn load_activities(project_dir: &Path) -> Result<Vec<CommitHistoryEntry>> {
    match find_single_t4c_file(COMMIT_HISTORY_PREFIX, JSON_EXTENSION, project_dir) {
        Ok(path) => json::read_activities(&path),
        Err(DiscoveryError::NotFound { .. }) => {
            let path = find_single_t4c_file(
                COMMIT_HISTORY_PREFIX,
                ACTIVITYMETADATA_EXTENSION,
                project_dir,
            )?;
            activitymetadata::read_activities(&path)
        }
        Err(err) => Err(err.into()),
    }
}

/// Render the exported activities as YAML together with the newest activity date.
///
/// Returns `("", None)` when there is nothing new since the last backup.
pub fn extract_commit_information(
    project_dir: &Path,
) -> Result<(String, Option<DateTime<FixedOffset>>)> {
    log::info!(
        "Start extracting TeamForCapella commit information in {}",
        project_dir.display()
    );

    let activities = load_activities(project_dir)?;
    if activities.is_empty() {
        log::info!("No commits since last backup");
        return Ok((String::new(), None));
    }

    let yaml = render_yaml(&activities)?;
    Ok((yaml, latest_date(&activities)))
}

/// Newest activity date, independent of the order in the file.
pub fn latest_date(activities: &[CommitHistoryEntry]) -> Option<DateTime<FixedOffset>> {
    activities.iter().map(|activity| activity.date).max()
}

pub fn render_yaml(activities: &[CommitHistoryEntry]) -> Result<String> {
    serde_yaml::to_string(activities).context("Failed to render commit history as YAML")
}

/// Copy the exported commit history files next to the model in the Git repository.
pub fn copy_commit_history_files(project_dir: &Path, target_dir: &Path) -> Result<()> {
    for (extension, target_name) in [
        (JSON_EXTENSION, "CommitHistory.json"),
        (ACTIVITYMETADATA_EXTENSION, "CommitHistory.activitymetadata"),
    ] {
        match find_single_t4c_file(COMMIT_HISTORY_PREFIX, extension, project_dir) {
            Ok(source) => {
                let target = target_dir.join(target_name);
                fs::copy(&source, &target).with_context(|| {
                    format!("Failed to copy {} to {}", source.display(), target.display())
                })?;
            }
            Err(DiscoveryError::NotFound { .. }) => {
                log::debug!("No {extension} commit history exported, skipping copy");
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
