//! Recognition of the importer's and exporter's textual results.
//!
//! The Capella CLI exits with code 0 for many failed operations, so failures
//! are detected from individual stdout lines and success has to be confirmed
//! from the accumulated output once the process is done.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::version::CapellaVersion;
use crate::error::CapellaError;

const PROJECT_NOT_FOUND_PATTERN: &str = r"project .+ not found on the repository .+\.";
const IMPORT_FAILED_PATTERN: &str = r"[1-9][0-9]* projects? imports? failed";
const ARCHIVING_FAILED_PATTERN: &str = r"[1-9][0-9]* archivings? failed";
const EXPORT_FAILED_PATTERN: &str = r"[1-9][0-9]* projects? exports? failed";

pub const LEGACY_SUCCESS_PATTERN: &str = r"!MESSAGE [1-9][0-9]* Succeeded";
pub const IMPORT_SUCCESS_PATTERN: &str = r"[1-9][0-9]* projects? imports? succeeded";
pub const ARCHIVING_SUCCESS_PATTERN: &str = r"[1-9][0-9]* archivings? succeeded";

struct Patterns {
    project_not_found: Regex,
    import_failed: Regex,
    archiving_failed: Regex,
    export_failed: Regex,
    legacy_success: Regex,
    import_success: Regex,
    archiving_success: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("static regex");
        Patterns {
            project_not_found: compile(PROJECT_NOT_FOUND_PATTERN),
            import_failed: compile(IMPORT_FAILED_PATTERN),
            archiving_failed: compile(ARCHIVING_FAILED_PATTERN),
            export_failed: compile(EXPORT_FAILED_PATTERN),
            legacy_success: compile(LEGACY_SUCCESS_PATTERN),
            import_success: compile(IMPORT_SUCCESS_PATTERN),
            archiving_success: compile(ARCHIVING_SUCCESS_PATTERN),
        }
    })
}

/// Line validator for the importer.
pub struct ImporterValidator {
    output_folder: PathBuf,
}

impl ImporterValidator {
    pub fn new(output_folder: &Path) -> Self {
        Self {
            output_folder: output_folder.to_path_buf(),
        }
    }

    pub fn validate(&self, line: &str) -> Result<(), CapellaError> {
        let patterns = patterns();

        if patterns.project_not_found.is_match(line) || line.contains("No project found!") {
            log::warn!(
                "Project not found in the repository. This is expected if the \
                 referenced revision relates to another project in the repository."
            );
            return Err(CapellaError::ProjectNotFound);
        }
        if patterns.import_failed.is_match(line) {
            return Err(CapellaError::ImportFailed);
        }
        if patterns.archiving_failed.is_match(line) {
            return Err(CapellaError::ArchivingFailed(self.output_folder.clone()));
        }
        Ok(())
    }
}

/// Line validator for the exporter.
pub fn validate_exporter_line(line: &str) -> Result<(), CapellaError> {
    if line.contains("No address associated with hostname") {
        Err(CapellaError::UnknownHost)
    } else if line.contains("No such user:") {
        Err(CapellaError::UnknownUser)
    } else if patterns().export_failed.is_match(line) {
        Err(CapellaError::ExportFailed)
    } else {
        Ok(())
    }
}

/// Confirm that a cleanly exited import actually reported success.
pub fn verify_import_succeeded(stdout: &str, version: &CapellaVersion) -> Result<(), CapellaError> {
    let patterns = patterns();

    let required = if version.uses_legacy_success_marker() {
        vec![(&patterns.legacy_success, LEGACY_SUCCESS_PATTERN)]
    } else {
        vec![
            (&patterns.import_success, IMPORT_SUCCESS_PATTERN),
            (&patterns.archiving_success, ARCHIVING_SUCCESS_PATTERN),
        ]
    };

    for (regex, pattern) in required {
        if !regex.is_match(stdout) {
            return Err(CapellaError::MissingSuccessMarker(pattern.to_string()));
        }
    }
    Ok(())
}
