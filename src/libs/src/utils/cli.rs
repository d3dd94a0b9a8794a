use std::path::PathBuf;

use clap::{arg, command, value_parser, ArgMatches};

pub const CONFIG_KEY: &str = "config";
pub const LOG_LEVEL_KEY: &str = "log-level";

pub fn setup_cli() -> ArgMatches {
    command!() // requires `cargo` feature
        .arg(
            arg!(
                -c --config <FILE> "Sets a custom config file"
            )
            .required(false)
            .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(
                -l --"log-level" <LEVEL> "Overrides the log level of the config file"
            )
            .required(false),
        )
        .get_matches()
}

/// Log level given on the command line, if any, wins over the one from config.
pub fn log_level_override(matches: &ArgMatches, configured: &str) -> String {
    matches
        .get_one::<String>(LOG_LEVEL_KEY)
        .cloned()
        .unwrap_or_else(|| configured.to_string())
}
