use log::{Level, LevelFilter};
use std::fmt;
use std::io::Write;

/// Initialize the logging system
///
/// Logs go to stdout so they interleave with the echoed Capella output in the
/// container log. The level comes from `--log-level` / `LOG_LEVEL`; module
/// specific filters in `RUST_LOG` are still honoured on top of it.
///
/// ## Examples
///
/// ```bash
/// # Show the Git and Capella command lines
/// LOG_LEVEL=debug t4c-cli backup
///
/// # Only warnings and errors
/// t4c-cli --log-level warn export
/// ```
pub fn init_logger(level: &str) {
    let level = parse_level(level);

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            writeln!(buf, "{}", format_line(timestamp, record.level(), record.args()))
        })
        .filter_level(level)
        .target(env_logger::Target::Stdout)
        .try_init()
        .ok(); // Ignore error if logger is already initialized
}

fn format_line(timestamp: impl fmt::Display, level: Level, message: impl fmt::Display) -> String {
    format!("{timestamp} [{level:5}] {message}")
}

/// Parse a level name, accepting Python-style names like `WARNING`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "warning" => LevelFilter::Warn,
        "critical" | "fatal" => LevelFilter::Error,
        other => other.parse::<LevelFilter>().unwrap_or(LevelFilter::Info),
    }
}

/// Prefix every line of `text` with `prefix`.
pub fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Log a failed subprocess in a readable format.
///
/// Never pass credentials as part of `command`.
pub fn log_command_failure(code: Option<i32>, command: &[&str], stdout: &str, stderr: &str) {
    log::error!(
        "Command failed with return code {}. See output below.\n{}\n{}\n{}",
        code.map_or_else(|| "unknown".to_string(), |c| c.to_string()),
        indent(&command.join(" "), "[COMMAND] "),
        indent(stdout, "[STDOUT] "),
        indent(stderr, "[STDERR] "),
    );
}
