use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Descriptions containing this marker stem from the importer itself
pub const IMPORT_NOISE_MARKER: &str = "[Import][Application]";

const DEFAULT_DESCRIPTION: &str = "No commit message";
const DEFAULT_USER: &str = "Unknown";

/// One user activity on the TeamForCapella server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitHistoryEntry {
    pub description: String,
    pub date: DateTime<FixedOffset>,
    pub user: String,
}

impl CommitHistoryEntry {
    /// Build an entry from raw exported fields.
    ///
    /// Returns `None` for importer bookkeeping entries, which would otherwise
    /// show up as new activity on every run.
    pub(super) fn from_raw(
        date: DateTime<FixedOffset>,
        user: Option<&str>,
        description: Option<&str>,
    ) -> Option<Self> {
        let description = description.map(str::trim_end).filter(|d| !d.is_empty());

        if description.is_some_and(|d| d.contains(IMPORT_NOISE_MARKER)) {
            return None;
        }

        Some(Self {
            description: description.unwrap_or(DEFAULT_DESCRIPTION).to_string(),
            date,
            user: user
                .filter(|u| !u.is_empty())
                .unwrap_or(DEFAULT_USER)
                .to_string(),
        })
    }
}

/// Parse an activity timestamp as written by TeamForCapella.
///
/// Accepts RFC 3339, offsets without colon (`+0100`) and timestamps without
/// offset, which are taken as UTC.
pub fn parse_t4c_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        })
}
