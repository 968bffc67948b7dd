//! Typed failures that callers need to tell apart.
//!
//! Everything else travels as `anyhow::Error` with context attached at the
//! boundary where it happened.

use std::path::PathBuf;
use thiserror::Error;

/// Failure classes reported by a Capella command invocation.
#[derive(Debug, Error)]
pub enum CapellaError {
    /// The TeamForCapella server could not be reached (connection or DNS failure).
    #[error("Team for Capella server unreachable")]
    ServerUnreachable,

    /// The configured TeamForCapella repository does not exist on the server.
    #[error("Repository \"{0}\" does not exist")]
    RepositoryNotFound(String),

    #[error("Unknown host")]
    UnknownHost,

    #[error("Unknown user")]
    UnknownUser,

    /// The project does not exist on the server at the requested revision.
    #[error("Project not found in the repository")]
    ProjectNotFound,

    #[error("Backup failed. Please check the logs above.")]
    ImportFailed,

    #[error("Failed to create archives in output folder ({})", .0.display())]
    ArchivingFailed(PathBuf),

    #[error("Export failed")]
    ExportFailed,

    /// The command exited cleanly but never reported success.
    #[error("'{0}' not found in logs")]
    MissingSuccessMarker(String),

    #[error("Capella command failed with exit code {}: {stderr}", exit_code_label(.code))]
    CommandFailed { code: Option<i32>, stderr: String },

    #[error("Failed to run the Capella command: {0}")]
    Io(#[from] std::io::Error),
}

impl CapellaError {
    /// Whether this failure must end the whole process rather than a single step.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CapellaError::ProjectNotFound)
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

/// Outcome of looking for exactly one exported file in a directory.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No files found matching pattern: {pattern} in {}", .dir.display())]
    NotFound { pattern: String, dir: PathBuf },

    #[error("Multiple files found matching pattern: {pattern} - {matches:?}")]
    MultipleFound {
        pattern: String,
        matches: Vec<String>,
    },
}
