//! CLI definitions for BidWatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// BidWatch CLI.
#[derive(Parser)]
#[command(name = "bidwatch")]
#[command(about = "Live auction state relay")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "config/default.toml",
        env = "BIDWATCH_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the relay in foreground (default)
    Run {
        /// Server host (overrides [server].host)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides [server].port)
        #[arg(long)]
        port: Option<u16>,

        /// Chrome remote debugging endpoint (overrides [browser].endpoint)
        #[arg(long)]
        cdp_endpoint: Option<String>,
    },

    /// Validate the configuration file and exit
    Check,
}
