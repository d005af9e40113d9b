//! BidWatch - live auction state relay.
//!
//! Main entry point for the BidWatch CLI and server.

mod cli;
mod server;

use clap::Parser;
use tracing::info;

use bidwatch_config::ConfigValidator;

use crate::cli::{Cli, Commands};
use crate::server::{Overrides, init_tracing, load_config, run_server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing()?;

    let cli = Cli::parse();

    match cli.command {
        None => run_server(load_config(&cli.config, Overrides::default())?).await,
        Some(Commands::Run {
            host,
            port,
            cdp_endpoint,
        }) => {
            let overrides = Overrides {
                host,
                port,
                cdp_endpoint,
            };
            run_server(load_config(&cli.config, overrides)?).await
        }
        Some(Commands::Check) => {
            let config = load_config(&cli.config, Overrides::default())?;
            let report = ConfigValidator::validate(&config);
            info!(
                "Configuration OK ({} warning(s)); serving on {}:{}",
                report.warnings.len(),
                config.server.host,
                config.server.port
            );
            Ok(())
        }
    }
}
