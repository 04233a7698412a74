//! fovfinder CLI - command-line interface
//!
//! Plans instrument pointings against survey images, writes finding charts
//! and manages the configuration file.

mod commands;
mod error;

use std::process;

use clap::{Parser, Subcommand};
use fovfinder::config::ConfigFile;
use fovfinder::logging::{init_logging, LoggingConfig};

use commands::common::print_error;
use commands::config::ConfigCommands;
use commands::finder::FinderArgs;
use commands::plan::PlanArgs;
use commands::shell::ShellArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "fovfinder")]
#[command(version, about = "Plan instrument field of view and readout windows against sky images", long_about = None)]
struct Cli {
    /// Also log to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log filter, e.g. debug or fovfinder=trace (overrides logging.level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Draw the detector overlay for one pointing and save it as an image
    Plan(PlanArgs),

    /// Write an annotated finding chart from a FITS image
    Finder(FinderArgs),

    /// Interactive planning session
    Shell(ShellArgs),

    /// Look up the coordinates of an object name
    Resolve {
        /// Object name, e.g. "M1" or "NGC 1068"
        name: String,
    },

    /// View or change configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        print_error(&e.to_string());
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    // Config commands must work even when the file is broken
    let command = match cli.command {
        Commands::Config { command } => return commands::config::run(command),
        other => other,
    };

    let config = ConfigFile::load()?;

    let mut logging = LoggingConfig::from(config.logging.clone()).with_console(cli.verbose);
    if let Some(level) = cli.log_level {
        logging = logging.with_level(level);
    }
    let _guard = init_logging(&logging)?;
    tracing::debug!(
        config = %fovfinder::config::config_file_path().display(),
        instrument = %config.instrument.name,
        "Configuration loaded"
    );

    match command {
        Commands::Plan(args) => commands::plan::run(args, &config),
        Commands::Finder(args) => commands::finder::run(args, &config),
        Commands::Shell(args) => commands::shell::run(args, &config),
        Commands::Resolve { name } => commands::resolve::run(&name, &config),
        Commands::Config { .. } => Ok(()),
    }
}
