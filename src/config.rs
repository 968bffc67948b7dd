use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory the importer writes its archives and commit history into.
pub const DEFAULT_PROJECT_DIR: &str = "/tmp/model";

/// Directory the target Git repository is cloned into.
pub const DEFAULT_GIT_DIR: &str = "/tmp/git";

/// Root of the model in `LOCAL` export mode.
pub const DEFAULT_LOCAL_ROOT: &str = "/tmp/data";

pub const DEFAULT_CREDENTIALS_FILE: &str = "/tmp/t4c_credentials";
pub const DEFAULT_ASKPASS: &str = "/etc/git_askpass.py";
pub const DEFAULT_CAPELLA_INSTALL_DIR: &str = "/opt/capella";
pub const DEFAULT_T4C_PORT: &str = "2036";
pub const DEFAULT_GIT_EMAIL: &str = "backup@example.com";

/// Where the exported model ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileHandler {
    Git,
    Local,
}

impl FileHandler {
    fn parse(value: &str) -> Result<Self> {
        match value.to_uppercase().as_str() {
            "GIT" => Ok(FileHandler::Git),
            "LOCAL" => Ok(FileHandler::Local),
            other => Err(anyhow!(
                "Invalid FILE_HANDLER '{}'. Expected GIT or LOCAL",
                other
            )),
        }
    }
}

/// How TeamForCapella activities are mapped onto Git commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommitMapping {
    /// One Git commit per TeamForCapella activity
    Exact,
    /// One Git commit for all activities since the last backup
    Grouped,
}

impl CommitMapping {
    fn parse(value: &str) -> Result<Self> {
        match value.to_uppercase().as_str() {
            "EXACT" => Ok(CommitMapping::Exact),
            "GROUPED" => Ok(CommitMapping::Grouped),
            other => Err(anyhow!(
                "Invalid COMMIT_MAPPING '{}'. Expected EXACT or GROUPED",
                other
            )),
        }
    }
}

/// Git repository the model is backed up to or exported from
#[derive(Debug, Clone, Serialize)]
pub struct GitConfig {
    pub repo_url: String,
    pub branch: String,

    /// Path of the model inside the repository (directory or `.aird` file)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,

    pub email: String,
    pub username: String,

    #[serde(skip_serializing)]
    pub password: String,

    pub askpass: PathBuf,
    pub dir_path: PathBuf,
}

/// TeamForCapella server, repository and project
#[derive(Debug, Clone, Serialize)]
pub struct T4cConfig {
    pub repo_host: String,
    pub repo_port: String,
    pub repo_name: String,
    pub project_name: String,
    pub username: String,

    #[serde(skip_serializing)]
    pub password: String,

    pub credentials_file_path: PathBuf,
    pub include_commit_history: bool,
    pub project_dir_path: PathBuf,
}

impl T4cConfig {
    /// Write the `user:password` file passed to the Capella CLI.
    pub fn write_credentials_file(&self) -> Result<()> {
        write_private_file(
            &self.credentials_file_path,
            &format!("{}:{}", self.username, self.password),
        )
        .with_context(|| {
            format!(
                "Failed to write credentials file: {}",
                self.credentials_file_path.display()
            )
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CapellaConfig {
    /// Capella release, e.g. `6.0.0` or `7.0.1`
    pub version: String,
    pub install_dir: PathBuf,
    pub executable: PathBuf,
}

/// Process configuration, read once at startup and passed down by reference.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub file_handler: FileHandler,
    pub commit_mapping: CommitMapping,
    pub local_root_path: PathBuf,
    pub export_dir_path: PathBuf,
    pub git: GitConfig,
    pub t4c: T4cConfig,
    pub capella: CapellaConfig,
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated like unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let require = |key: &str| {
            get(key).with_context(|| format!("Missing required environment variable {key}"))
        };

        let file_handler = match get("FILE_HANDLER") {
            Some(value) => FileHandler::parse(&value)?,
            None => FileHandler::Git,
        };
        let commit_mapping = match get("COMMIT_MAPPING") {
            Some(value) => CommitMapping::parse(&value)?,
            None => CommitMapping::Grouped,
        };

        let git = GitConfig {
            repo_url: get("GIT_REPO_URL").unwrap_or_default(),
            branch: get("GIT_REPO_BRANCH").unwrap_or_default(),
            entrypoint: get("ENTRYPOINT").or_else(|| get("GIT_REPO_ENTRYPOINT")),
            email: get("GIT_EMAIL").unwrap_or_else(|| DEFAULT_GIT_EMAIL.to_string()),
            username: get("GIT_USERNAME").unwrap_or_default(),
            password: get("GIT_PASSWORD").unwrap_or_default(),
            askpass: PathBuf::from(DEFAULT_ASKPASS),
            dir_path: PathBuf::from(DEFAULT_GIT_DIR),
        };

        let project_name = require("T4C_PROJECT_NAME")?;
        let export_dir_path = Path::new("/tmp").join(&project_name);

        let t4c = T4cConfig {
            repo_host: require("T4C_REPO_HOST")?,
            repo_port: get("T4C_REPO_PORT").unwrap_or_else(|| DEFAULT_T4C_PORT.to_string()),
            repo_name: require("T4C_REPO_NAME")?,
            project_name,
            username: get("T4C_USERNAME").unwrap_or_default(),
            password: get("T4C_PASSWORD").unwrap_or_default(),
            credentials_file_path: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            include_commit_history: get("INCLUDE_COMMIT_HISTORY")
                .map(|value| str_to_bool(&value))
                .unwrap_or(false),
            project_dir_path: PathBuf::from(DEFAULT_PROJECT_DIR),
        };

        let install_dir = PathBuf::from(DEFAULT_CAPELLA_INSTALL_DIR);
        let capella = CapellaConfig {
            version: get("CAPELLA_VERSION").unwrap_or_default(),
            executable: install_dir.join("capella"),
            install_dir,
        };

        Ok(Config {
            file_handler,
            commit_mapping,
            local_root_path: get("ROOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_ROOT)),
            export_dir_path,
            git,
            t4c,
            capella,
        })
    }

    /// Check the settings needed to talk to the Git remote.
    pub fn validate_git(&self) -> Result<()> {
        if self.git.repo_url.is_empty() {
            bail!("GIT_REPO_URL must be set when FILE_HANDLER is GIT");
        }
        if self.git.branch.is_empty() {
            bail!("GIT_REPO_BRANCH must be set when FILE_HANDLER is GIT");
        }
        Ok(())
    }
}

pub fn str_to_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1")
}

#[cfg(unix)]
fn write_private_file(path: &Path, content: &str) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content.as_bytes())
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content.as_bytes())
}
