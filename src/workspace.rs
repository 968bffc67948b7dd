//! File system steps around the importer and exporter.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

use crate::error::DiscoveryError;

/// Remove everything inside `dir`, or create it if it does not exist.
///
/// The directory itself is kept because it may be a mounted volume.
pub fn clean_and_create_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        return Ok(());
    }

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        let removed = if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        removed.with_context(|| format!("Failed to remove {}", path.display()))?;
    }

    Ok(())
}

fn timestamp_regex() -> &'static Regex {
    static TIMESTAMP: OnceLock<Regex> = OnceLock::new();
    TIMESTAMP.get_or_init(|| Regex::new(r"^_.{8}_.{6}$").expect("static regex"))
}

/// Find the single T4C output file `<prefix>_YYYYMMDD_HHMMSS.<extension>` in `dir`.
///
/// The importer embeds a timestamp in every file it writes. Zero or several
/// candidates mean the directory is in an unexpected state, so neither case
/// picks a file.
pub fn find_single_t4c_file(
    prefix: &str,
    extension: &str,
    dir: &Path,
) -> Result<PathBuf, DiscoveryError> {
    let pattern = format!("{prefix}_????????_??????.{extension}");
    let suffix = format!(".{extension}");
    let is_match = |name: &str| {
        name.strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix.as_str()))
            .is_some_and(|stamp| timestamp_regex().is_match(stamp))
    };

    let mut matches: Vec<String> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| is_match(name))
        .collect();
    matches.sort();

    match matches.len() {
        0 => Err(DiscoveryError::NotFound {
            pattern,
            dir: dir.to_path_buf(),
        }),
        1 => Ok(dir.join(&matches[0])),
        _ => Err(DiscoveryError::MultipleFound { pattern, matches }),
    }
}

/// Extract the project archive written by the importer into `project_dir`.
pub fn unzip_project_archive(project_dir: &Path, project_name: &str) -> Result<PathBuf> {
    log::info!("Start unzipping project archive in {}", project_dir.display());

    let archive_path = find_single_t4c_file(project_name, "zip", project_dir)?;
    let file = fs::File::open(&archive_path)
        .with_context(|| format!("Failed to open {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip archive {}", archive_path.display()))?;
    archive
        .extract(project_dir)
        .with_context(|| format!("Failed to unzip {}", archive_path.display()))?;

    log::info!("Finished unzipping {}", archive_path.display());
    Ok(archive_path)
}

/// Recursively copy the contents of `source` into `target`, overwriting files.
pub fn copy_dir_contents(source: &Path, target: &Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", source.display()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .context("walked path outside of source")?;
        let destination = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)
                .with_context(|| format!("Failed to create {}", destination.display()))?;
        } else {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &destination).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    entry.path().display(),
                    destination.display()
                )
            })?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Resolve the directory holding the model below `root`.
///
/// The TeamForCapella CLI works on directories, so an entrypoint naming a
/// file (an existing file or an `.aird` path) resolves to its parent.
pub fn determine_model_dir(
    root: &Path,
    entrypoint: Option<&str>,
    create_if_not_exist: bool,
) -> Result<PathBuf> {
    let mut model_dir = match entrypoint {
        Some(entrypoint) => root.join(entrypoint.trim_start_matches('/')),
        None => root.to_path_buf(),
    };

    if !create_if_not_exist && !model_dir.exists() {
        bail!("Model directory {} does not exist", model_dir.display());
    }

    let names_aird_file = model_dir.extension().is_some_and(|ext| ext == "aird");
    if model_dir.is_file() || (!model_dir.exists() && names_aird_file) {
        log::warn!(
            "The entrypoint '{}' is a file. Due to limitations with the TeamForCapella CLI, \
             falling back to the parent directory as model directory.",
            entrypoint.unwrap_or_default()
        );
        model_dir = model_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());
    }

    if create_if_not_exist {
        fs::create_dir_all(&model_dir)
            .with_context(|| format!("Failed to create {}", model_dir.display()))?;
    }

    Ok(model_dir)
}

/// Require exactly one `.aird` file in `dir`, named like the entrypoint if it names one.
pub fn check_dir_for_aird_file(dir: &Path, entrypoint: Option<&str>) -> Result<PathBuf> {
    let aird_files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "aird"))
        .collect();

    if aird_files.len() != 1 {
        bail!(
            "Entrypoint (if provided) or root directory does not contain exactly one .aird file (found {})",
            aird_files.len()
        );
    }
    let found = &aird_files[0];

    let expected = entrypoint
        .map(Path::new)
        .filter(|path| path.extension().is_some_and(|ext| ext == "aird"))
        .and_then(Path::file_name);
    if let Some(expected) = expected {
        if found.file_name() != Some(expected) {
            bail!(
                "Found {}, but expected {} as provided.",
                found.file_name().unwrap_or_default().to_string_lossy(),
                expected.to_string_lossy()
            );
        }
    }

    Ok(found.clone())
}
