//! What the Capella/TeamForCapella CLI of a given release can do.
//!
//! Flag names and log formats changed between Capella releases. Every
//! version-dependent decision goes through [`CapellaVersion`] so the
//! compatibility matrix lives in one place.

use regex::Regex;
use std::sync::OnceLock;

/// Parsed `CAPELLA_VERSION` with its capability flags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapellaVersion {
    raw: String,
    major: Option<u32>,
    minor: Option<u32>,
}

impl CapellaVersion {
    /// Parse a `major.minor.patch` version. Unknown formats have no capabilities.
    pub fn parse(version: &str) -> Self {
        static VERSION_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = VERSION_REGEX
            .get_or_init(|| Regex::new(r"^(\d+)\.(\d+)\.\d+").expect("static regex"));

        let (major, minor) = match regex.captures(version.trim()) {
            Some(caps) => (caps[1].parse().ok(), caps[2].parse().ok()),
            None => (None, None),
        };

        Self {
            raw: version.to_string(),
            major,
            minor,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_5_x(&self) -> bool {
        self.major == Some(5)
    }

    pub fn is_5_0_x(&self) -> bool {
        self.is_5_x() && self.minor == Some(0)
    }

    fn is_7_or_later(&self) -> bool {
        self.major.is_some_and(|major| major >= 7)
    }

    /// Name of the flag that receives the credentials file
    pub fn credentials_flag(&self) -> &'static str {
        if self.is_5_x() {
            "-importerCredentials"
        } else {
            "-repositoryCredentials"
        }
    }

    /// Capella 5.0.x reports success as `!MESSAGE N Succeeded`
    pub fn uses_legacy_success_marker(&self) -> bool {
        self.is_5_0_x()
    }

    /// `-importType COMMIT_HISTORY_ONLY` is understood by the importer
    pub fn supports_commit_history_only(&self) -> bool {
        self.is_7_or_later()
    }

    /// `-checkout <timestamp>` works reliably, enabling one commit per activity
    pub fn supports_exact_commit_mapping(&self) -> bool {
        self.is_7_or_later()
    }

    pub fn supports_export(&self) -> bool {
        !self.is_5_x()
    }
}
