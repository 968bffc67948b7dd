use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::fs;
use std::path::Path;

use super::types::{parse_t4c_datetime, CommitHistoryEntry};

/// Read the activities of a `CommitHistory__*.activitymetadata` export.
///
/// Every direct child of the root element is one activity carrying `date`,
/// `userId` and `description` attributes.
pub(super) fn read_activities(path: &Path) -> Result<Vec<CommitHistoryEntry>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read commit history {}", path.display()))?;
    parse_activities(&content)
        .with_context(|| format!("Failed to parse commit history {}", path.display()))
}

fn parse_activities(content: &str) -> Result<Vec<CommitHistoryEntry>> {
    let mut reader = Reader::from_str(content);
    let mut activities = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(element) => {
                if depth == 1 {
                    activities.extend(parse_activity(&element)?);
                }
                depth += 1;
            }
            Event::Empty(element) => {
                if depth == 1 {
                    activities.extend(parse_activity(&element)?);
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(activities)
}

fn parse_activity(element: &BytesStart<'_>) -> Result<Option<CommitHistoryEntry>> {
    let mut date = None;
    let mut user = None;
    let mut description = None;

    for attribute in element.attributes() {
        let attribute = attribute?;
        let value = attribute.unescape_value()?.into_owned();
        match attribute.key.local_name().as_ref() {
            b"date" => date = Some(value),
            b"userId" => user = Some(value),
            b"description" => description = Some(value),
            _ => {}
        }
    }

    let Some(raw_date) = date else {
        log::warn!("Skipping activity without date");
        return Ok(None);
    };
    let date = parse_t4c_datetime(&raw_date)
        .with_context(|| format!("Invalid activity date '{raw_date}'"))?;

    Ok(CommitHistoryEntry::from_raw(
        date,
        user.as_deref(),
        description.as_deref(),
    ))
}
