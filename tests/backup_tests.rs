//! Commit reconciliation tests against an in-memory repository.

mod common;

use common::{
    activity, hourly_activities, test_config, FakeImporter, FakeScm, ImporterCall, RecordedCommit,
};
use t4c_cli::backup::{parse_grouped_commit_message, store_locally, BackupOutcome, BackupRun};
use t4c_cli::config::Config;
use t4c_cli::error::CapellaError;
use t4c_cli::scm::CommitOutcome;
use tempfile::TempDir;

fn run(importer: &FakeImporter, scm: &FakeScm, config: &Config) -> anyhow::Result<BackupOutcome> {
    BackupRun::new(importer, scm, config).run()
}

fn model_revision(commit: &RecordedCommit) -> &str {
    commit
        .files
        .get("project.capella")
        .map(String::as_str)
        .unwrap_or("missing")
}

fn import_failed() -> CapellaError {
    CapellaError::ImportFailed
}

fn repository_not_found() -> CapellaError {
    CapellaError::RepositoryNotFound("repo".to_string())
}

// =============================================================================
// Exact commit mapping
// =============================================================================

#[test]
fn test_exact_replays_activities_oldest_first() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("COMMIT_MAPPING", "EXACT")]);
    let activities = hourly_activities(3);
    let importer = FakeImporter::new(&config.t4c.project_dir_path, activities.clone());
    let scm = FakeScm::new(&config.git.dir_path);

    let outcome = run(&importer, &scm, &config).unwrap();

    assert_eq!(outcome, BackupOutcome::Exact { committed: 3, skipped: 0 });

    let commits = scm.commits.borrow();
    assert_eq!(commits.len(), 3);
    for (index, (commit, activity)) in commits.iter().zip(&activities).enumerate() {
        assert_eq!(commit.message, format!("[CDI] Change {index}"));
        assert_eq!(commit.author, activity.user);
        assert_eq!(commit.datetime, Some(activity.date));
        assert_eq!(model_revision(commit), format!("revision {}", index + 1));
    }

    let calls = importer.calls.borrow();
    assert_eq!(calls[0], ImporterCall::FetchCommitHistory { since: None });
    assert_eq!(
        calls[1..],
        activities
            .iter()
            .map(|a| ImporterCall::Import {
                since: None,
                checkout: Some(a.date)
            })
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_exact_replays_same_timestamp_activities_in_recorded_order() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("COMMIT_MAPPING", "EXACT")]);
    let activities = vec![
        activity("2024-03-01T09:00:00.000+01:00", "alice", "Create diagram"),
        activity("2024-03-01T09:00:00.500+01:00", "alice", "Lock element"),
        activity("2024-03-01T09:00:00.500+01:00", "alice", "Unlock element"),
    ];
    let importer = FakeImporter::new(&config.t4c.project_dir_path, activities);
    let scm = FakeScm::new(&config.git.dir_path);

    run(&importer, &scm, &config).unwrap();

    let messages: Vec<String> = scm.commits.borrow().iter().map(|c| c.message.clone()).collect();
    assert_eq!(
        messages,
        vec!["[CDI] Create diagram", "[CDI] Lock element", "[CDI] Unlock element"]
    );
}

#[test]
fn test_exact_second_run_is_noop() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("COMMIT_MAPPING", "EXACT")]);
    let importer = FakeImporter::new(&config.t4c.project_dir_path, hourly_activities(3));
    let scm = FakeScm::new(&config.git.dir_path);

    run(&importer, &scm, &config).unwrap();
    let outcome = run(&importer, &scm, &config).unwrap();

    assert_eq!(outcome, BackupOutcome::NoChanges);
    assert_eq!(scm.commits.borrow().len(), 3);
}

#[test]
fn test_exact_picks_up_only_new_activities() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("COMMIT_MAPPING", "EXACT")]);
    let mut activities = hourly_activities(4);
    let newest = activities.pop().unwrap();
    let mut importer = FakeImporter::new(&config.t4c.project_dir_path, activities);
    let scm = FakeScm::new(&config.git.dir_path);

    run(&importer, &scm, &config).unwrap();

    importer.activities.push(newest.clone());
    importer.calls.borrow_mut().clear();
    let outcome = run(&importer, &scm, &config).unwrap();

    assert_eq!(outcome, BackupOutcome::Exact { committed: 1, skipped: 0 });
    let messages = scm.messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[3], "[CDI] Change 3");

    let since = scm.commits.borrow()[2]
        .datetime
        .map(|date| date.to_utc());
    assert_eq!(
        importer.calls.borrow()[0],
        ImporterCall::FetchCommitHistory { since }
    );
}

#[test]
fn test_exact_skips_checkout_before_project_existed() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("COMMIT_MAPPING", "EXACT")]);
    let activities = hourly_activities(3);
    let mut importer = FakeImporter::new(&config.t4c.project_dir_path, activities.clone());
    importer.missing_at.insert(activities[0].date);
    let scm = FakeScm::new(&config.git.dir_path);

    let outcome = run(&importer, &scm, &config).unwrap();

    assert_eq!(outcome, BackupOutcome::Exact { committed: 2, skipped: 1 });
    assert_eq!(scm.messages(), vec!["[CDI] Change 1", "[CDI] Change 2"]);
}

#[test]
fn test_exact_commits_unchanged_model() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("COMMIT_MAPPING", "EXACT")]);
    // Two activities in the same second export the same revision
    let importer = FakeImporter::new(
        &config.t4c.project_dir_path,
        vec![
            activity("2024-03-01T08:00:00+01:00", "alice", "Create diagram"),
            activity("2024-03-01T09:00:00+01:00", "bob", "Lock element"),
            activity("2024-03-01T09:00:00+01:00", "bob", "Unlock element"),
        ],
    );
    let scm = FakeScm::new(&config.git.dir_path);

    let outcome = run(&importer, &scm, &config).unwrap();

    assert_eq!(outcome, BackupOutcome::Exact { committed: 3, skipped: 0 });
    let commits = scm.commits.borrow();
    assert_eq!(commits[1].files, commits[2].files);
}

#[test]
fn test_exact_mapping_limit() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("COMMIT_MAPPING", "EXACT")]);
    let importer = FakeImporter::new(&config.t4c.project_dir_path, hourly_activities(20));
    let scm = FakeScm::new(&config.git.dir_path);

    let outcome = run(&importer, &scm, &config).unwrap();

    assert_eq!(outcome, BackupOutcome::Exact { committed: 20, skipped: 0 });
}

#[test]
fn test_exact_falls_back_to_grouped_above_limit() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("COMMIT_MAPPING", "EXACT")]);
    let activities = hourly_activities(21);
    let newest = activities[20].date;
    let importer = FakeImporter::new(&config.t4c.project_dir_path, activities);
    let scm = FakeScm::new(&config.git.dir_path);

    let outcome = run(&importer, &scm, &config).unwrap();

    assert_eq!(
        outcome,
        BackupOutcome::Grouped {
            latest: Some(newest),
            commit: CommitOutcome::Pushed
        }
    );

    let commits = scm.commits.borrow();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].datetime, Some(newest));
    assert_eq!(commits[0].author, "backup-bot");
    assert_eq!(parse_grouped_commit_message(&commits[0].message).unwrap().len(), 21);

    assert_eq!(
        importer.calls.borrow().as_slice(),
        [
            ImporterCall::FetchCommitHistory { since: None },
            ImporterCall::Import {
                since: None,
                checkout: None
            }
        ]
    );
}

#[test]
fn test_exact_requires_capella_7() {
    let temp = TempDir::new().unwrap();
    let config = test_config(
        temp.path(),
        &[("COMMIT_MAPPING", "EXACT"), ("CAPELLA_VERSION", "6.0.0")],
    );
    let importer = FakeImporter::new(&config.t4c.project_dir_path, hourly_activities(3));
    let scm = FakeScm::new(&config.git.dir_path);

    let outcome = run(&importer, &scm, &config).unwrap();

    assert!(matches!(outcome, BackupOutcome::Grouped { .. }));
    assert_eq!(scm.commits.borrow().len(), 1);
    assert!(!importer
        .calls
        .borrow()
        .iter()
        .any(|call| matches!(call, ImporterCall::FetchCommitHistory { .. })));
}

#[test]
fn test_fatal_import_error_aborts() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("COMMIT_MAPPING", "EXACT")]);
    let mut importer = FakeImporter::new(&config.t4c.project_dir_path, hourly_activities(3));
    importer.fail_with = Some(import_failed as fn() -> CapellaError);
    let scm = FakeScm::new(&config.git.dir_path);

    let err = run(&importer, &scm, &config).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CapellaError>(),
        Some(CapellaError::ImportFailed)
    ));
    assert!(scm.commits.borrow().is_empty());
}

// =============================================================================
// Grouped commit mapping
// =============================================================================

#[test]
fn test_grouped_creates_single_commit() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[]);
    let activities = vec![
        activity("2024-03-01T08:00:00+01:00", "alice", "Create diagram"),
        activity("2024-03-01T09:00:00+01:00", "admin", "[Import][Application] sync"),
        activity("2024-03-01T10:00:00+01:00", "bob", "Rename function"),
    ];
    let importer = FakeImporter::new(&config.t4c.project_dir_path, activities);
    let scm = FakeScm::new(&config.git.dir_path);

    let outcome = run(&importer, &scm, &config).unwrap();
    assert!(matches!(
        outcome,
        BackupOutcome::Grouped {
            commit: CommitOutcome::Pushed,
            ..
        }
    ));

    let commits = scm.commits.borrow();
    assert_eq!(commits.len(), 1);
    assert_eq!(model_revision(&commits[0]), "revision 3");
    assert_eq!(
        commits[0].datetime.map(|d| d.to_rfc3339()),
        Some("2024-03-01T10:00:00+01:00".to_string())
    );

    let listed = parse_grouped_commit_message(&commits[0].message).unwrap();
    let users: Vec<&str> = listed.iter().map(|entry| entry.user.as_str()).collect();
    assert_eq!(users, vec!["bob", "alice"]);
}

#[test]
fn test_grouped_second_run_is_noop() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[]);
    let importer = FakeImporter::new(&config.t4c.project_dir_path, hourly_activities(5));
    let scm = FakeScm::new(&config.git.dir_path);

    run(&importer, &scm, &config).unwrap();
    let outcome = run(&importer, &scm, &config).unwrap();

    assert_eq!(outcome, BackupOutcome::NoChanges);
    assert_eq!(scm.commits.borrow().len(), 1);
}

#[test]
fn test_grouped_uses_legacy_backup_commit() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[]);
    let activities = hourly_activities(3);
    let importer = FakeImporter::new(&config.t4c.project_dir_path, activities.clone());
    let scm = FakeScm::new(&config.git.dir_path);
    scm.commits.borrow_mut().push(RecordedCommit {
        message: "Backup".to_string(),
        author: "backup".to_string(),
        datetime: Some(activities[1].date),
        files: Default::default(),
    });

    run(&importer, &scm, &config).unwrap();

    let commits = scm.commits.borrow();
    assert_eq!(commits.len(), 2);
    let listed = parse_grouped_commit_message(&commits[1].message).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].description, "Change 2");
}

#[test]
fn test_grouped_copies_commit_history_when_requested() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("INCLUDE_COMMIT_HISTORY", "true")]);
    let importer = FakeImporter::new(&config.t4c.project_dir_path, hourly_activities(2));
    let scm = FakeScm::new(&config.git.dir_path);

    run(&importer, &scm, &config).unwrap();

    let commits = scm.commits.borrow();
    assert!(commits[0].files.contains_key("CommitHistory.json"));
    assert!(!commits[0].files.contains_key("CommitHistory.activitymetadata"));
}

#[test]
fn test_grouped_copies_into_entrypoint_directory() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("ENTRYPOINT", "/models/project/project.aird")]);
    let importer = FakeImporter::new(&config.t4c.project_dir_path, hourly_activities(1));
    let scm = FakeScm::new(&config.git.dir_path);

    run(&importer, &scm, &config).unwrap();

    let commits = scm.commits.borrow();
    assert!(commits[0].files.contains_key("models/project/project.capella"));
    assert!(commits[0].files.contains_key("models/project/project.aird"));
}

#[test]
fn test_repository_not_found_is_fatal() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[]);
    let mut importer = FakeImporter::new(&config.t4c.project_dir_path, hourly_activities(1));
    importer.fail_with = Some(repository_not_found as fn() -> CapellaError);
    let scm = FakeScm::new(&config.git.dir_path);

    let err = run(&importer, &scm, &config).unwrap_err();
    assert_eq!(err.to_string(), "Repository \"repo\" does not exist");
}

// =============================================================================
// Local file handler
// =============================================================================

#[test]
fn test_store_locally_extracts_archive() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path(), &[("FILE_HANDLER", "LOCAL")]);
    let importer = FakeImporter::new(&config.t4c.project_dir_path, hourly_activities(2));

    let outcome = store_locally(&importer, &config.t4c).unwrap();

    assert_eq!(outcome, BackupOutcome::StoredLocally);
    let model = config.t4c.project_dir_path.join("project/project.capella");
    assert_eq!(std::fs::read_to_string(model).unwrap(), "revision 2");
    assert!(!config.git.dir_path.exists());
}
