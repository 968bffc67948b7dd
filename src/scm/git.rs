//! Git SCM backend using CLI commands.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use super::{CommitOutcome, CommitRequest, Scm, DEFAULT_AUTHOR};
use crate::config::GitConfig;
use crate::logger::log_command_failure;

/// Git SCM implementation using the git CLI.
///
/// Credentials are never put on the command line; they are passed through
/// `GIT_USERNAME`/`GIT_PASSWORD` to the askpass helper.
pub struct GitScm {
    workdir: PathBuf,
    repo_url: String,
    branch: String,
    email: String,
    username: String,
    password: String,
    askpass: PathBuf,
}

impl GitScm {
    fn from_config(config: &GitConfig) -> Self {
        Self {
            workdir: config.dir_path.clone(),
            repo_url: config.repo_url.clone(),
            branch: config.branch.clone(),
            email: config.email.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            askpass: config.askpass.clone(),
        }
    }

    /// Reset machine-wide Git settings the container image ships with.
    ///
    /// Hooks installed by the image must not run for backup commits, and Git
    /// LFS has to be active for repositories that store models in LFS.
    pub fn prepare_global_config() -> Result<()> {
        let output = Command::new("git")
            .args(["config", "--global", "--unset", "core.hooksPath"])
            .output()
            .context("Failed to run 'git config'")?;
        // Exit code 5 means the key was not set
        if !output.status.success() && output.status.code() != Some(5) {
            log_failed_output(&["git", "config", "--global", "--unset", "core.hooksPath"], &output);
            return Err(anyhow!("Failed to unset core.hooksPath"));
        }

        match Command::new("git").args(["lfs", "install"]).output() {
            Ok(output) if output.status.success() => {}
            Ok(output) => log::warn!(
                "git lfs install failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(err) => log::warn!("Failed to run 'git lfs install': {err}"),
        }

        Ok(())
    }

    /// Clone the configured repository into the configured directory.
    ///
    /// Any previous clone is removed first. If the configured branch does not
    /// exist, the clone stays on the default branch unless
    /// `raise_if_branch_missing` is set. The first push then creates the branch.
    pub fn clone_to_dir_path(config: &GitConfig, raise_if_branch_missing: bool) -> Result<Self> {
        let scm = Self::from_config(config);
        let git_dir = &scm.workdir;

        if git_dir.exists() {
            fs::remove_dir_all(git_dir)
                .with_context(|| format!("Failed to remove old clone at {}", git_dir.display()))?;
        }
        fs::create_dir_all(git_dir)
            .with_context(|| format!("Failed to create directory '{}'", git_dir.display()))?;

        log::debug!("Cloning git repository...");
        let clone_args = vec![
            "clone".to_string(),
            "--filter=blob:none".to_string(),
            scm.repo_url.clone(),
            git_dir.to_string_lossy().into_owned(),
        ];
        let output = scm
            .command(&clone_args)
            .output()
            .context("Failed to run 'git clone'")?;
        if !output.status.success() {
            log_failed_output(&["git", "clone", "--filter=blob:none", &scm.repo_url], &output);
            return Err(anyhow!(
                "Failed to clone repository from '{}'.\n\
                \n\
                Possible causes:\n\
                1. Authentication failed - check GIT_USERNAME and GIT_PASSWORD\n\
                2. Invalid repository URL\n\
                3. Network connectivity issues",
                scm.repo_url
            ));
        }

        let output = scm
            .command(&["switch".to_string(), scm.branch.clone()])
            .env("SKIP_POST_CHECKOUT", "1")
            .output()
            .context("Failed to run 'git switch'")?;
        if !output.status.success() {
            if raise_if_branch_missing {
                log_failed_output(&["git", "switch", &scm.branch], &output);
                return Err(anyhow!(
                    "Couldn't switch to branch {} in repository {}. Check the log message above.",
                    scm.branch,
                    scm.repo_url
                ));
            }
            log::info!(
                "Branch '{}' does not exist yet, it will be created on the first push",
                scm.branch
            );
        }

        log::debug!("Clone of git repository finished");
        Ok(scm)
    }

    /// Prepared `git` command in the working copy with the askpass environment.
    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_USERNAME", &self.username)
            .env("GIT_PASSWORD", &self.password)
            .env("GIT_ASKPASS", &self.askpass)
            .env("GIT_TERMINAL_PROMPT", "0");
        command
    }

    /// Run a git command and return stdout as a string.
    fn run_git(&self, args: &[&str]) -> Result<String> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let output = self
            .command(&owned)
            .output()
            .with_context(|| format!("Failed to run 'git {}'", args.first().unwrap_or(&"")))?;

        if !output.status.success() {
            let mut logged = vec!["git"];
            logged.extend_from_slice(args);
            log_failed_output(&logged, &output);
            return Err(anyhow!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Whether the index differs from HEAD.
    fn has_staged_changes(&self) -> Result<bool> {
        let status = self
            .command(&["diff", "--cached", "--quiet"].map(str::to_string))
            .status()
            .context("Failed to run 'git diff'")?;

        match status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            code => Err(anyhow!("git diff --cached failed with exit code {:?}", code)),
        }
    }

    fn push(&self) -> Result<()> {
        let refspec = format!("HEAD:{}", self.branch);
        let output = self
            .command(&["push".to_string(), "origin".to_string(), refspec.clone()])
            .output()
            .context("Failed to run 'git push'")?;

        if !output.status.success() {
            log_failed_output(&["git", "push", "origin", &refspec], &output);
            return Err(anyhow!(
                "Failed to push to branch '{}' of '{}': {}",
                self.branch,
                self.repo_url,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}

impl Scm for GitScm {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn find_last_commit_timestamp_by_text_search(&self, pattern: &str) -> Result<Option<DateTime<Utc>>> {
        let output = self
            .command(&[
                "log".to_string(),
                "-1".to_string(),
                "--format=%at".to_string(),
                format!("--grep={pattern}"),
            ])
            .output()
            .context("Failed to run 'git log'")?;

        // An empty repository has no log at all
        if !output.status.success() {
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(None);
        }

        let seconds: i64 = stdout
            .parse()
            .with_context(|| format!("Unexpected git log timestamp '{stdout}'"))?;
        Ok(DateTime::from_timestamp(seconds, 0))
    }

    fn commit_and_push(&self, request: &CommitRequest) -> Result<CommitOutcome> {
        let committer = if self.username.is_empty() {
            DEFAULT_AUTHOR
        } else {
            self.username.as_str()
        };
        self.run_git(&["config", "user.email", &self.email])?;
        self.run_git(&["config", "user.name", committer])?;
        self.run_git(&["add", "."])?;

        if !self.has_staged_changes()? && !request.allow_empty {
            log::warn!("No changes, will not commit.");
            return Ok(CommitOutcome::NoChanges);
        }

        let mut args = vec!["commit".to_string()];
        if request.allow_empty {
            args.push("--allow-empty".to_string());
        }
        args.push("--author".to_string());
        args.push(format!("{} <{}>", request.author, self.email));
        args.push("--message".to_string());
        args.push(request.message.clone());

        let mut command = self.command(&args);
        if let Some(datetime) = request.datetime {
            let date = datetime.to_rfc3339();
            command
                .env("GIT_AUTHOR_DATE", &date)
                .env("GIT_COMMITTER_DATE", &date);
        }
        let output = command.output().context("Failed to run 'git commit'")?;
        if !output.status.success() {
            log_failed_output(&["git", "commit", "--author", &request.author], &output);
            return Err(anyhow!(
                "git commit failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        self.push()?;
        Ok(CommitOutcome::Pushed)
    }
}

fn log_failed_output(command: &[&str], output: &Output) {
    log_command_failure(
        output.status.code(),
        command,
        &String::from_utf8_lossy(&output.stdout),
        &String::from_utf8_lossy(&output.stderr),
    );
}
