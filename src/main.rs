use anyhow::Result;
use clap::{Parser, Subcommand};

use t4c_cli::handlers::{self, ConfigFormat};
use t4c_cli::logger;

#[derive(Parser)]
#[command(name = "t4c-cli")]
#[command(about = "Back up TeamForCapella projects to Git and export models to TeamForCapella", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the TeamForCapella project and commit it to Git
    Backup,

    /// Export the model from Git or ROOT_PATH to TeamForCapella
    Export,

    /// Show the configuration read from the environment
    ShowConfig {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ConfigFormat::Toml)]
        format: ConfigFormat,
    },
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Backup => handlers::handle_backup(),
        Commands::Export => handlers::handle_export(),
        Commands::ShowConfig { format } => handlers::handle_show_config(format),
    }
}

fn main() {
    let cli = Cli::parse();

    logger::init_logger(&cli.log_level);
    handlers::configure_colors();

    if let Err(err) = run(cli) {
        log::error!("{err:?}");
        std::process::exit(1);
    }
}
