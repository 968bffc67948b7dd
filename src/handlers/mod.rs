//! Command handler modules
//!
//! Each subcommand loads the configuration from the environment, runs and
//! prints a short human readable summary.

pub mod backup;
pub mod config;
pub mod export;

pub use backup::handle_backup;
pub use config::{handle_show_config, ConfigFormat};
pub use export::handle_export;

/// Check if stdout is a terminal
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdout)
}

/// Disable colors when the output ends up in a container log or a file.
pub fn configure_colors() {
    if !is_interactive() {
        colored::control::set_override(false);
    }
}
