use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// An authoritative DNS server for statically loaded zones.
///
/// adnsd serves answers from zone files only: it does not recurse,
/// forward, cache upstream answers, or perform zone transfers.
#[derive(Debug, Parser)]
#[command(version)]
pub struct Cli {
    /// Path to the config file (YAML)
    #[arg(short, long, global = true, env = "ADNSD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load and validate the configured zones, then exit.
    Check,

    /// Start the server in the foreground (or daemonised, per config).
    Start,

    /// Ask a running instance (found via its PID file) to reload its zones.
    Reload,

    /// Configuration-related utilities.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the fully resolved configuration (file merged with environment) and exit.
    Show,

    /// Write a config file containing the default settings to the given path.
    Init {
        /// Where to write the new config file
        #[arg(default_value = "adnsd.yaml")]
        path: PathBuf,
    },
}
