//! SCM (Source Control Management) abstraction layer.
//!
//! The backup only needs a narrow slice of Git: find the previous backup,
//! commit the new state with controlled metadata and push it.

mod git;

use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use std::path::Path;

pub use git::GitScm;

/// Author and committer name when no Git username is configured
pub const DEFAULT_AUTHOR: &str = "Backup";

/// A commit to create and push to the configured branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub message: String,
    /// Author and committer date; `None` uses the current time
    pub datetime: Option<DateTime<FixedOffset>>,
    /// Author name, combined with the configured email address
    pub author: String,
    /// Create the commit even when nothing is staged
    pub allow_empty: bool,
}

/// What `commit_and_push` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Pushed,
    /// Nothing staged and empty commits not allowed
    NoChanges,
}

/// Operations the backup performs on the target repository.
pub trait Scm {
    /// Root of the local working copy
    fn workdir(&self) -> &Path;

    /// Author timestamp of the newest commit whose message matches `pattern`.
    fn find_last_commit_timestamp_by_text_search(&self, pattern: &str) -> Result<Option<DateTime<Utc>>>;

    /// Stage everything in the working copy, commit it and push it upstream.
    fn commit_and_push(&self, request: &CommitRequest) -> Result<CommitOutcome>;
}
