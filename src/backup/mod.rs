//! Backup of a TeamForCapella project into Git or the local filesystem.
//!
//! TeamForCapella keeps its own history of user activities. A backup imports
//! the project, then replays the activities since the previous backup as Git
//! commits, either all at once ([`CommitMapping::Grouped`]) or one commit per
//! activity ([`CommitMapping::Exact`]).

pub mod importer;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, Utc};

use crate::capella::CapellaVersion;
use crate::config::{CommitMapping, Config, FileHandler, T4cConfig};
use crate::history::{self, CommitHistoryEntry};
use crate::scm::{CommitOutcome, CommitRequest, GitScm, Scm, DEFAULT_AUTHOR};
use crate::workspace::{
    clean_and_create_dir, copy_dir_contents, determine_model_dir, unzip_project_archive,
};

pub use importer::{CapellaImporter, Importer};

/// More pending activities than this are backed up as one grouped commit
pub const EXACT_COMMIT_MAPPING_LIMIT: usize = 20;

/// Tag at the start of every commit message written by the backup
pub const BACKUP_COMMIT_TAG: &str = "[CDI]";

const GROUPED_COMMIT_PREFIX: &str = "[CDI] Backup\n\n";
const LAST_BACKUP_PATTERN: &str = r"\[CDI\]";
// Commits of older releases don't carry the tag
const LEGACY_BACKUP_PATTERN: &str = "Backup";

/// What a backup run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// `LOCAL` mode, the project was extracted into the project directory
    StoredLocally,
    /// No activity since the last backup
    NoChanges,
    Grouped {
        /// Date of the newest activity, used as commit date
        latest: Option<DateTime<FixedOffset>>,
        commit: CommitOutcome,
    },
    Exact {
        committed: usize,
        skipped: usize,
    },
}

/// Message of a grouped backup commit listing the activities as YAML
pub fn grouped_commit_message(commit_information: &str) -> String {
    format!("{GROUPED_COMMIT_PREFIX}{commit_information}")
}

/// Recover the activities listed in a grouped backup commit message.
pub fn parse_grouped_commit_message(message: &str) -> Result<Vec<CommitHistoryEntry>> {
    let Some(yaml) = message.strip_prefix(GROUPED_COMMIT_PREFIX) else {
        bail!("Not a grouped backup commit message");
    };
    serde_yaml::from_str(yaml).context("Failed to parse activities of grouped backup commit")
}

/// Choose the commit mapping the installed Capella can actually deliver.
pub fn select_commit_mapping(requested: CommitMapping, version: &CapellaVersion) -> CommitMapping {
    match requested {
        CommitMapping::Exact if version.supports_exact_commit_mapping() => CommitMapping::Exact,
        CommitMapping::Exact => {
            log::warn!(
                "Exact commit mapping is only supported with Capella 7.x.x and later \
                 (configured: {}). Fallback to grouped commits.",
                version.as_str()
            );
            CommitMapping::Grouped
        }
        CommitMapping::Grouped => CommitMapping::Grouped,
    }
}

/// Import once and extract the archive, without any Git involvement.
pub fn store_locally<I: Importer>(importer: &I, t4c: &T4cConfig) -> Result<BackupOutcome> {
    importer.import(None, None)?;
    unzip_project_archive(&t4c.project_dir_path, &t4c.project_name)?;

    log::info!("Backup of model finished (stored locally)");
    Ok(BackupOutcome::StoredLocally)
}

/// Reconciles TeamForCapella activities with the commits of a cloned repository.
pub struct BackupRun<'a, I, S> {
    importer: &'a I,
    scm: &'a S,
    t4c: &'a T4cConfig,
    entrypoint: Option<&'a str>,
    author: &'a str,
    commit_mapping: CommitMapping,
    version: CapellaVersion,
}

impl<'a, I: Importer, S: Scm> BackupRun<'a, I, S> {
    pub fn new(importer: &'a I, scm: &'a S, config: &'a Config) -> Self {
        let author = if config.git.username.is_empty() {
            DEFAULT_AUTHOR
        } else {
            config.git.username.as_str()
        };

        Self {
            importer,
            scm,
            t4c: &config.t4c,
            entrypoint: config.git.entrypoint.as_deref(),
            author,
            commit_mapping: config.commit_mapping,
            version: CapellaVersion::parse(&config.capella.version),
        }
    }

    pub fn run(&self) -> Result<BackupOutcome> {
        let last_backup = self.last_backup_timestamp()?;
        match last_backup {
            Some(timestamp) => log::info!("The last backup Git commit was on {timestamp}"),
            None => log::info!("No previous backup commit found"),
        }

        match select_commit_mapping(self.commit_mapping, &self.version) {
            CommitMapping::Exact => self.exact(last_backup),
            CommitMapping::Grouped => self.grouped(last_backup),
        }
    }

    fn last_backup_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        match self.scm.find_last_commit_timestamp_by_text_search(LAST_BACKUP_PATTERN)? {
            Some(timestamp) => Ok(Some(timestamp)),
            None => self
                .scm
                .find_last_commit_timestamp_by_text_search(LEGACY_BACKUP_PATTERN),
        }
    }

    /// One commit for all activities since the last backup
    fn grouped(&self, since: Option<DateTime<Utc>>) -> Result<BackupOutcome> {
        // An earlier history-only fetch must not leave a second history file behind
        clean_and_create_dir(&self.t4c.project_dir_path)?;

        self.importer.import(since, None)?;
        unzip_project_archive(&self.t4c.project_dir_path, &self.t4c.project_name)?;

        let (commit_information, latest) =
            history::extract_commit_information(&self.t4c.project_dir_path)?;
        if commit_information.is_empty() {
            log::info!("No new commits since last backup");
            return Ok(BackupOutcome::NoChanges);
        }

        self.copy_exported_files_into_git_repo()?;
        let commit = self.scm.commit_and_push(&CommitRequest {
            message: grouped_commit_message(&commit_information),
            datetime: latest,
            author: self.author.to_string(),
            allow_empty: false,
        })?;

        log::info!("Backup of model finished with grouped commit mapping");
        Ok(BackupOutcome::Grouped { latest, commit })
    }

    /// One commit per activity, oldest first
    fn exact(&self, since: Option<DateTime<Utc>>) -> Result<BackupOutcome> {
        clean_and_create_dir(&self.t4c.project_dir_path)?;
        self.importer.fetch_commit_history(since)?;
        let mut activities = history::load_activities(&self.t4c.project_dir_path)?;

        if activities.is_empty() {
            log::info!("No new commits since last backup");
            return Ok(BackupOutcome::NoChanges);
        }

        if activities.len() > EXACT_COMMIT_MAPPING_LIMIT {
            log::warn!(
                "Too many commits for the exact commit mapping. Falling back to grouped commit mapping."
            );
            return self.grouped(since);
        }

        log::info!("Found {} commits since last backup", activities.len());
        // Listed newest first; ties keep their reversed order
        activities.reverse();
        activities.sort_by_key(|activity| activity.date);

        let total = activities.len();
        let mut committed = 0;
        let mut skipped = 0;

        for (index, activity) in activities.iter().enumerate() {
            log::info!(
                "Starting to export the following commit ({}/{}):\nDate: {}\nDescription: {}\nUser: {}",
                index + 1,
                total,
                activity.date,
                activity.description,
                activity.user
            );

            // Git stores whole seconds
            if since.is_some_and(|last| last.timestamp() == activity.date.timestamp()) {
                log::info!(
                    "Skipping commit '{}' from '{}', already committed",
                    activity.description,
                    activity.date
                );
                skipped += 1;
                continue;
            }

            clean_and_create_dir(&self.t4c.project_dir_path)?;
            match self.importer.import(None, Some(activity.date)) {
                Ok(()) => {}
                Err(err) if !err.is_fatal() => {
                    log::warn!(
                        "Project not found in the repository for commit {}. Continue with next commit.",
                        activity.date
                    );
                    skipped += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            }

            unzip_project_archive(&self.t4c.project_dir_path, &self.t4c.project_name)?;
            self.copy_exported_files_into_git_repo()?;

            self.scm.commit_and_push(&CommitRequest {
                message: format!("{BACKUP_COMMIT_TAG} {}", activity.description),
                datetime: Some(activity.date),
                author: activity.user.clone(),
                allow_empty: true,
            })?;
            committed += 1;
        }

        log::info!("Backup of model finished with exact commit mapping");
        Ok(BackupOutcome::Exact { committed, skipped })
    }

    fn copy_exported_files_into_git_repo(&self) -> Result<()> {
        log::info!("Start copying files...");

        let target = determine_model_dir(self.scm.workdir(), self.entrypoint, true)?;
        let model_dir = self.t4c.project_dir_path.join(&self.t4c.project_name);
        let copied = copy_dir_contents(&model_dir, &target)?;

        if self.t4c.include_commit_history {
            history::copy_commit_history_files(&self.t4c.project_dir_path, &target)?;
        }

        log::info!("Finished copying {copied} files");
        Ok(())
    }
}

/// Run a complete backup as configured.
pub fn backup(config: &Config) -> Result<BackupOutcome> {
    clean_and_create_dir(&config.t4c.project_dir_path)?;
    config.t4c.write_credentials_file()?;

    let importer = CapellaImporter::from_config(config);

    match config.file_handler {
        FileHandler::Local => store_locally(&importer, &config.t4c),
        FileHandler::Git => {
            config.validate_git()?;
            GitScm::prepare_global_config()?;
            let scm = GitScm::clone_to_dir_path(&config.git, false)?;
            BackupRun::new(&importer, &scm, config).run()
        }
    }
}
