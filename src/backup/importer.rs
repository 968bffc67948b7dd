//! TeamForCapella importer invocation.

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::capella::validators::{verify_import_succeeded, ImporterValidator};
use crate::capella::{CapellaRunner, CapellaVersion, LineValidator, IMPORTER_APPLICATION};
use crate::config::{Config, T4cConfig};
use crate::error::CapellaError;

/// Characters kept verbatim in `-projectName`
const PROJECT_NAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'@');

/// What a single importer run should fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Newest activity already backed up; only later activities are imported
    pub since: Option<DateTime<Utc>>,
    /// Fetch the commit history without the model
    pub commit_history_only: bool,
    /// Import the project as it was at this activity
    pub checkout: Option<DateTime<FixedOffset>>,
}

/// Format a timestamp the way the importer expects it: `yyyy-MM-ddTHH:mm:ss.SSS`, no zone.
pub fn format_t4c_datetime(datetime: NaiveDateTime) -> String {
    datetime.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Build the importer arguments following `-application`.
///
/// `now` closes the `-from`/`-to` window and is only used when `since` is set.
pub fn build_backup_command(
    t4c: &T4cConfig,
    version: &CapellaVersion,
    options: &ImportOptions,
    now: NaiveDateTime,
) -> Vec<String> {
    let mut command: Vec<String> = vec![
        "-closeserverOnFailure".into(),
        "false".into(),
        "-hostname".into(),
        t4c.repo_host.clone(),
        "-port".into(),
        t4c.repo_port.clone(),
        "-repoName".into(),
        t4c.repo_name.clone(),
        "-projectName".into(),
        utf8_percent_encode(&t4c.project_name, PROJECT_NAME_ENCODE_SET).to_string(),
        version.credentials_flag().into(),
        t4c.credentials_file_path.to_string_lossy().into_owned(),
        "-outputFolder".into(),
        t4c.project_dir_path.to_string_lossy().into_owned(),
        "-archiveProject".into(),
        "true".into(),
        "-overrideExistingProject".into(),
        "true".into(),
        "-importCommitHistoryAsJson".into(),
        "true".into(),
        "-backupDBOnFailure".into(),
        "false".into(),
    ];

    if options.commit_history_only && version.supports_commit_history_only() {
        command.extend(["-importType".to_string(), "COMMIT_HISTORY_ONLY".to_string()]);
    }

    if let Some(since) = options.since {
        command.extend([
            "-from".to_string(),
            format_t4c_datetime((since + Duration::seconds(1)).naive_utc()),
            "-to".to_string(),
            format_t4c_datetime(now),
        ]);
    }

    if let Some(checkout) = options.checkout {
        command.extend(["-checkout".to_string(), format_t4c_datetime(checkout.naive_local())]);
    }

    command
}

/// Source of project archives and commit history written into the project directory.
pub trait Importer {
    /// Write only the commit history of activities after `since`.
    fn fetch_commit_history(&self, since: Option<DateTime<Utc>>) -> Result<(), CapellaError>;

    /// Write the project archive plus commit history.
    ///
    /// With `checkout`, the project is exported as it was at that activity.
    fn import(
        &self,
        since: Option<DateTime<Utc>>,
        checkout: Option<DateTime<FixedOffset>>,
    ) -> Result<(), CapellaError>;
}

/// [`Importer`] backed by the Capella CLI
pub struct CapellaImporter {
    runner: CapellaRunner,
    t4c: T4cConfig,
    version: CapellaVersion,
}

impl CapellaImporter {
    pub fn new(runner: CapellaRunner, t4c: T4cConfig, version: CapellaVersion) -> Self {
        Self {
            runner,
            t4c,
            version,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            CapellaRunner::from_config(config),
            config.t4c.clone(),
            CapellaVersion::parse(&config.capella.version),
        )
    }

    fn arguments(&self, options: &ImportOptions) -> Vec<String> {
        build_backup_command(&self.t4c, &self.version, options, Local::now().naive_local())
    }
}

impl Importer for CapellaImporter {
    fn fetch_commit_history(&self, since: Option<DateTime<Utc>>) -> Result<(), CapellaError> {
        let arguments = self.arguments(&ImportOptions {
            since,
            commit_history_only: true,
            checkout: None,
        });
        self.runner.run(IMPORTER_APPLICATION, &arguments, None)?;
        Ok(())
    }

    fn import(
        &self,
        since: Option<DateTime<Utc>>,
        checkout: Option<DateTime<FixedOffset>>,
    ) -> Result<(), CapellaError> {
        log::debug!("Import model from TeamForCapella server...");

        let arguments = self.arguments(&ImportOptions {
            since,
            commit_history_only: false,
            checkout,
        });
        let validator = ImporterValidator::new(&self.t4c.project_dir_path);
        let validate: &LineValidator<'_> = &|line: &str| validator.validate(line);

        let output = self
            .runner
            .run(IMPORTER_APPLICATION, &arguments, Some(validate))?;
        verify_import_succeeded(&output.stdout, &self.version)?;

        log::info!("Import of model from TeamForCapella server finished");
        Ok(())
    }
}
