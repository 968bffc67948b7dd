//! Invocation of the Capella command line applications.
//!
//! The Capella CLI is driven as a child process. Its stdout is inspected line
//! by line while the process runs, because several failure conditions only
//! show up as a log line after which the process may hang.

pub mod validators;
pub mod version;

use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

pub use version::CapellaVersion;

use crate::config::Config;
use crate::error::CapellaError;

/// Eclipse application id of the TeamForCapella importer
pub const IMPORTER_APPLICATION: &str = "com.thalesgroup.mde.melody.collab.importer";

/// Eclipse application id of the TeamForCapella exporter
pub const EXPORTER_APPLICATION: &str = "com.thalesgroup.mde.melody.collab.exporter";

const BASE_ARGUMENTS: &[&str] = &[
    "--launcher.suppressErrors",
    "-nosplash",
    "-console",
    "-consoleLog",
    "-data",
    "workspace",
];

/// Per-line check applied to the command output
pub type LineValidator<'a> = dyn Fn(&str) -> Result<(), CapellaError> + 'a;

/// Output collected from a finished Capella command
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    pub stdout: String,
}

/// Runs Capella applications from the Capella installation directory
#[derive(Debug, Clone)]
pub struct CapellaRunner {
    executable: PathBuf,
    working_dir: PathBuf,
    repo_name: String,
}

impl CapellaRunner {
    pub fn new(executable: PathBuf, working_dir: PathBuf, repo_name: impl Into<String>) -> Self {
        Self {
            executable,
            working_dir,
            repo_name: repo_name.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.capella.executable.clone(),
            config.capella.install_dir.clone(),
            config.t4c.repo_name.clone(),
        )
    }

    /// Run `application` with `arguments` and classify the result.
    ///
    /// Returns the captured output when the process exited with code 0 and no
    /// line was rejected. A zero exit code alone does not mean the operation
    /// succeeded; callers check the captured stdout for their success markers.
    pub fn run(
        &self,
        application: &str,
        arguments: &[String],
        validator: Option<&LineValidator<'_>>,
    ) -> Result<CapturedOutput, CapellaError> {
        let mut args: Vec<String> = BASE_ARGUMENTS.iter().map(|s| s.to_string()).collect();
        args.push("-application".to_string());
        args.push(application.to_string());
        args.extend(arguments.iter().cloned());

        log::info!(
            "Executing the following command: {} {}",
            self.executable.display(),
            args.join(" ")
        );

        let mut child = Command::new(&self.executable)
            .args(&args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::other("child stderr was not captured"))?;

        // Drain stderr concurrently so a chatty child cannot block on a full pipe
        let stderr_pump = thread::spawn(move || {
            let mut bytes = Vec::new();
            let _ = BufReader::new(stderr).read_to_end(&mut bytes);
            String::from_utf8_lossy(&bytes).into_owned()
        });

        let scanned = scan_output(
            BufReader::new(stdout),
            &mut io::stdout(),
            &self.repo_name,
            validator,
        );

        let stdout = match scanned {
            Ok(stdout) => stdout,
            Err(err) => {
                // The process may hang after printing a failure line. Its
                // descendants can keep stderr open, so the pump is detached.
                let _ = child.kill();
                let _ = child.wait();
                drop(stderr_pump);
                return Err(err);
            }
        };

        let status = child.wait()?;
        let stderr = stderr_pump.join().unwrap_or_default();
        if !stderr.is_empty() {
            println!("{}", crate::logger::indent(&stderr, "[STDERR] "));
        }

        if !status.success() {
            log::error!("Command failed with stderr: '{}'", stderr.trim_end());
            return Err(CapellaError::CommandFailed {
                code: status.code(),
                stderr,
            });
        }

        Ok(CapturedOutput { stdout })
    }
}

/// Consume `reader` line by line, echo each line and apply all checks.
///
/// Returns the accumulated output on end of stream. The first rejected line
/// stops the scan.
pub fn scan_output<R, W>(
    mut reader: R,
    echo: &mut W,
    repo_name: &str,
    validator: Option<&LineValidator<'_>>,
) -> Result<String, CapellaError>
where
    R: BufRead,
    W: Write,
{
    let mut output = String::new();
    let mut bytes = Vec::new();

    loop {
        bytes.clear();
        if reader.read_until(b'\n', &mut bytes)? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&bytes);
        output.push_str(&line);

        write!(echo, "[STDOUT] {}", line)?;
        if !line.ends_with('\n') {
            writeln!(echo)?;
        }
        echo.flush()?;

        check_common_failures(&line, repo_name)?;

        if let Some(validator) = validator {
            validator(&line)?;
        }
    }

    Ok(output)
}

/// Checks that apply to every Capella command regardless of the application.
fn check_common_failures(line: &str, repo_name: &str) -> Result<(), CapellaError> {
    if line.contains("Team for Capella server unreachable") || line.contains("Name or service not known") {
        return Err(CapellaError::ServerUnreachable);
    }

    if line.contains("Repository not found") {
        log::error!("Repository \"{}\" does not exist", repo_name);
        return Err(CapellaError::RepositoryNotFound(repo_name.to_string()));
    }

    Ok(())
}
