//! Configuration management CLI commands.
//!
//! `config get`, `config set`, `config list` and `config path` read and edit
//! `~/.fovfinder/config.ini` one key at a time.

use clap::Subcommand;
use console::style;
use fovfinder::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print one configuration value
    Get {
        /// Key as section.key (e.g. instrument.px_scale)
        key: String,
    },

    /// Change one configuration value
    Set {
        /// Key as section.key (e.g. readout.mode)
        key: String,

        /// New value; empty clears optional paths
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// List every key with its current value
    List,

    /// Print the configuration file location
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => run_get(&key),
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => run_path(),
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "unknown key '{}'; run 'fovfinder config list' for the available keys",
            key
        ))
    })
}

fn display_value(value: &str) -> String {
    if value.is_empty() {
        style("(not set)").dim().to_string()
    } else {
        value.to_string()
    }
}

fn run_get(key: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;
    let config = ConfigFile::load()?;
    println!("{}", display_value(&config_key.get(&config)));
    Ok(())
}

fn run_set(key: &str, value: &str) -> Result<(), CliError> {
    let config_key = parse_key(key)?;

    let config = ConfigFile::set_key(config_key, value)?;

    println!(
        "Set {} = {}",
        style(config_key.name()).bold(),
        display_value(&config_key.get(&config))
    );
    Ok(())
}

fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;

    println!("{}", style(config_file_path().display()).dim());
    let mut current_section = "";
    for key in ConfigKey::all() {
        let section = key.section();
        if section != current_section {
            println!();
            println!("{}", style(format!("[{}]", section)).cyan().bold());
            current_section = section;
        }
        println!("  {} = {}", key.key_name(), display_value(&key.get(&config)));
    }
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}
