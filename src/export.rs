//! Export of a model from Git or the local filesystem to TeamForCapella.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::capella::validators::validate_exporter_line;
use crate::capella::{CapellaRunner, CapellaVersion, LineValidator, EXPORTER_APPLICATION};
use crate::config::{Config, FileHandler, T4cConfig};
use crate::scm::{GitScm, Scm};
use crate::workspace::{
    check_dir_for_aird_file, clean_and_create_dir, copy_dir_contents, determine_model_dir,
};

/// Fail unless the installed Capella ships a usable exporter.
pub fn check_capella_version(version: &CapellaVersion) -> Result<()> {
    if !version.supports_export() {
        bail!("Operation is not supported for Capella 5.x.x");
    }
    Ok(())
}

/// Build the exporter arguments following `-application`.
pub fn build_export_command(t4c: &T4cConfig, model_dir: &Path) -> Vec<String> {
    vec![
        "-closeserverOnFailure".to_string(),
        "false".to_string(),
        "-overrideExistingProject".to_string(),
        "true".to_string(),
        "-mergeDifferenceOnExistingProjects".to_string(),
        "true".to_string(),
        "-hostname".to_string(),
        t4c.repo_host.clone(),
        "-port".to_string(),
        t4c.repo_port.clone(),
        "-repoName".to_string(),
        t4c.repo_name.clone(),
        "-repositoryCredentials".to_string(),
        t4c.credentials_file_path.to_string_lossy().into_owned(),
        "-sourceToExport".to_string(),
        model_dir.to_string_lossy().into_owned(),
    ]
}

/// Copy the model below `root` into `export_dir` and return `export_dir`.
///
/// The model directory must exist and hold exactly one `.aird` file.
pub fn stage_model(root: &Path, entrypoint: Option<&str>, export_dir: &Path) -> Result<PathBuf> {
    let model_dir = determine_model_dir(root, entrypoint, false)?;
    check_dir_for_aird_file(&model_dir, entrypoint)?;

    clean_and_create_dir(export_dir)?;
    let copied = copy_dir_contents(&model_dir, export_dir)?;
    log::debug!(
        "Copied {copied} files from {} to {}",
        model_dir.display(),
        export_dir.display()
    );

    Ok(export_dir.to_path_buf())
}

/// Run a complete export as configured.
pub fn export(config: &Config) -> Result<()> {
    check_capella_version(&CapellaVersion::parse(&config.capella.version))?;

    // Keeps the clone alive while the model is staged
    let scm;
    let root = match config.file_handler {
        FileHandler::Git => {
            config.validate_git()?;
            scm = GitScm::clone_to_dir_path(&config.git, true)?;
            scm.workdir()
        }
        FileHandler::Local => config.local_root_path.as_path(),
    };

    let source = stage_model(root, config.git.entrypoint.as_deref(), &config.export_dir_path)?;
    config.t4c.write_credentials_file()?;

    log::debug!("Export model to TeamForCapella server...");
    let validator: &LineValidator<'_> = &validate_exporter_line;
    CapellaRunner::from_config(config).run(
        EXPORTER_APPLICATION,
        &build_export_command(&config.t4c, &source),
        Some(validator),
    )?;

    log::info!("Export of model to TeamForCapella server finished");
    Ok(())
}
