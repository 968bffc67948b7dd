//! Test doubles for the TeamForCapella importer and the Git repository.

#![allow(dead_code)]

use chrono::{DateTime, Duration, FixedOffset, Utc};
use regex::Regex;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use t4c_cli::backup::Importer;
use t4c_cli::config::Config;
use t4c_cli::error::CapellaError;
use t4c_cli::scm::{CommitOutcome, CommitRequest, Scm};

pub const PROJECT: &str = "project";
const FILE_TIMESTAMP: &str = "20240301_120000";

/// Activity as stored on the fake server
#[derive(Debug, Clone)]
pub struct ServerActivity {
    pub date: DateTime<FixedOffset>,
    pub user: String,
    pub description: String,
}

pub fn activity(date: &str, user: &str, description: &str) -> ServerActivity {
    ServerActivity {
        date: DateTime::parse_from_rfc3339(date).unwrap(),
        user: user.to_string(),
        description: description.to_string(),
    }
}

/// `count` activities one hour apart, starting 2024-03-01T08:00:00+01:00
pub fn hourly_activities(count: usize) -> Vec<ServerActivity> {
    let start = DateTime::parse_from_rfc3339("2024-03-01T08:00:00+01:00").unwrap();
    (0..count)
        .map(|i| ServerActivity {
            date: start + Duration::hours(i as i64),
            user: format!("user{i}"),
            description: format!("Change {i}"),
        })
        .collect()
}

/// Which importer entry point was called with which arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImporterCall {
    FetchCommitHistory {
        since: Option<DateTime<Utc>>,
    },
    Import {
        since: Option<DateTime<Utc>>,
        checkout: Option<DateTime<FixedOffset>>,
    },
}

/// Writes what the TeamForCapella importer would write into the project directory.
///
/// The model file records how many activities the exported revision contains,
/// so every checkout produces a distinct model.
pub struct FakeImporter {
    pub project_dir: PathBuf,
    pub project_name: String,
    pub activities: Vec<ServerActivity>,
    /// Checkouts at these dates fail with `ProjectNotFound`
    pub missing_at: HashSet<DateTime<FixedOffset>>,
    /// Fail every import with this error
    pub fail_with: Option<fn() -> CapellaError>,
    pub calls: RefCell<Vec<ImporterCall>>,
}

impl FakeImporter {
    pub fn new(project_dir: &Path, activities: Vec<ServerActivity>) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            project_name: PROJECT.to_string(),
            activities,
            missing_at: HashSet::new(),
            fail_with: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Activities inside the `-from <since + 1s>` window, newest first.
    /// Activities sharing a timestamp are listed in reverse of their
    /// recorded order, the way the server lists them.
    fn window(&self, since: Option<DateTime<Utc>>) -> Vec<&ServerActivity> {
        let mut selected: Vec<&ServerActivity> = self
            .activities
            .iter()
            .filter(|a| since.map_or(true, |since| a.date >= since + Duration::seconds(1)))
            .collect();
        selected.reverse();
        selected.sort_by_key(|a| std::cmp::Reverse(a.date));
        selected
    }

    fn write_history(&self, activities: &[&ServerActivity]) {
        let activities: Vec<serde_json::Value> = activities
            .iter()
            .map(|a| {
                serde_json::json!({
                    "date": a.date.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string(),
                    "user": a.user,
                    "description": a.description,
                })
            })
            .collect();
        let content = serde_json::json!({ "activityMetadataExport": { "activities": activities } });

        fs::create_dir_all(&self.project_dir).unwrap();
        fs::write(
            self.project_dir.join(format!("CommitHistory__{FILE_TIMESTAMP}.json")),
            serde_json::to_string_pretty(&content).unwrap(),
        )
        .unwrap();
    }

    fn write_archive(&self, revision: usize) {
        let path = self
            .project_dir
            .join(format!("{}_{FILE_TIMESTAMP}.zip", self.project_name));
        let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
        let options = zip::write::SimpleFileOptions::default();

        writer
            .start_file(format!("{}/{}.capella", self.project_name, self.project_name), options)
            .unwrap();
        writer.write_all(format!("revision {revision}").as_bytes()).unwrap();
        writer
            .start_file(format!("{}/{}.aird", self.project_name, self.project_name), options)
            .unwrap();
        writer.write_all(b"<aird/>").unwrap();
        writer.finish().unwrap();
    }
}

impl Importer for FakeImporter {
    fn fetch_commit_history(&self, since: Option<DateTime<Utc>>) -> Result<(), CapellaError> {
        self.calls
            .borrow_mut()
            .push(ImporterCall::FetchCommitHistory { since });
        self.write_history(&self.window(since));
        Ok(())
    }

    fn import(
        &self,
        since: Option<DateTime<Utc>>,
        checkout: Option<DateTime<FixedOffset>>,
    ) -> Result<(), CapellaError> {
        self.calls
            .borrow_mut()
            .push(ImporterCall::Import { since, checkout });

        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        if checkout.is_some_and(|date| self.missing_at.contains(&date)) {
            return Err(CapellaError::ProjectNotFound);
        }

        let revision = match checkout {
            Some(date) => self.activities.iter().filter(|a| a.date <= date).count(),
            None => self.activities.len(),
        };
        self.write_history(&self.window(since));
        self.write_archive(revision);
        Ok(())
    }
}

/// Commit recorded by [`FakeScm`]
#[derive(Debug, Clone)]
pub struct RecordedCommit {
    pub message: String,
    pub author: String,
    pub datetime: Option<DateTime<FixedOffset>>,
    pub files: BTreeMap<String, String>,
}

/// In-memory repository on top of a plain working directory.
pub struct FakeScm {
    workdir: PathBuf,
    pub commits: RefCell<Vec<RecordedCommit>>,
}

impl FakeScm {
    pub fn new(workdir: &Path) -> Self {
        fs::create_dir_all(workdir).unwrap();
        Self {
            workdir: workdir.to_path_buf(),
            commits: RefCell::new(Vec::new()),
        }
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        WalkDir::new(&self.workdir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let relative = entry.path().strip_prefix(&self.workdir).unwrap();
                (
                    relative.to_string_lossy().to_string(),
                    fs::read_to_string(entry.path()).unwrap_or_default(),
                )
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.commits.borrow().iter().map(|c| c.message.clone()).collect()
    }
}

impl Scm for FakeScm {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn find_last_commit_timestamp_by_text_search(
        &self,
        pattern: &str,
    ) -> anyhow::Result<Option<DateTime<Utc>>> {
        let regex = Regex::new(pattern)?;
        Ok(self
            .commits
            .borrow()
            .iter()
            .rev()
            .find(|commit| regex.is_match(&commit.message))
            .and_then(|commit| commit.datetime)
            .and_then(|date| DateTime::from_timestamp(date.timestamp(), 0)))
    }

    fn commit_and_push(&self, request: &CommitRequest) -> anyhow::Result<CommitOutcome> {
        let files = self.snapshot();
        let unchanged = self
            .commits
            .borrow()
            .last()
            .map_or(files.is_empty(), |last| last.files == files);

        if unchanged && !request.allow_empty {
            return Ok(CommitOutcome::NoChanges);
        }

        self.commits.borrow_mut().push(RecordedCommit {
            message: request.message.clone(),
            author: request.author.clone(),
            datetime: request.datetime,
            files,
        });
        Ok(CommitOutcome::Pushed)
    }
}

/// Configuration with all working directories below `root`
pub fn test_config(root: &Path, extra: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = [
        ("T4C_REPO_HOST", "t4c.example.com"),
        ("T4C_REPO_NAME", "repo"),
        ("T4C_PROJECT_NAME", PROJECT),
        ("T4C_USERNAME", "admin"),
        ("T4C_PASSWORD", "secret"),
        ("GIT_REPO_URL", "https://git.example.com/models.git"),
        ("GIT_REPO_BRANCH", "main"),
        ("GIT_USERNAME", "backup-bot"),
        ("CAPELLA_VERSION", "7.0.0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (key, value) in extra {
        env.insert(key.to_string(), value.to_string());
    }

    let mut config = Config::from_lookup(|key| env.get(key).cloned()).unwrap();
    config.t4c.project_dir_path = root.join("model");
    config.t4c.credentials_file_path = root.join("credentials");
    config.git.dir_path = root.join("git");
    config.git.askpass = root.join("askpass");
    config.local_root_path = root.join("data");
    config.export_dir_path = root.join("export");
    config
}
