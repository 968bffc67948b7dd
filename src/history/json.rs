use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::types::{parse_t4c_datetime, CommitHistoryEntry};

#[derive(Debug, Deserialize)]
struct CommitHistoryFile {
    #[serde(rename = "activityMetadataExport")]
    export: ActivityMetadataExport,
}

#[derive(Debug, Deserialize)]
struct ActivityMetadataExport {
    #[serde(default)]
    activities: Vec<RawActivity>,
}

#[derive(Debug, Deserialize)]
struct RawActivity {
    date: String,
    #[serde(default, alias = "userId")]
    user: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Read the activities of a `CommitHistory__*.json` export
pub(super) fn read_activities(path: &Path) -> Result<Vec<CommitHistoryEntry>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read commit history {}", path.display()))?;
    parse_activities(&content)
        .with_context(|| format!("Failed to parse commit history {}", path.display()))
}

fn parse_activities(content: &str) -> Result<Vec<CommitHistoryEntry>> {
    let file: CommitHistoryFile = serde_json::from_str(content)?;

    let mut activities = Vec::with_capacity(file.export.activities.len());
    for raw in file.export.activities {
        let date = parse_t4c_datetime(&raw.date)
            .with_context(|| format!("Invalid activity date '{}'", raw.date))?;

        if let Some(entry) =
            CommitHistoryEntry::from_raw(date, raw.user.as_deref(), raw.description.as_deref())
        {
            activities.push(entry);
        }
    }

    Ok(activities)
}
