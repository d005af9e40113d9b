//! Startup and shutdown wiring for the relay.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use bidwatch_api::{ApiServer, AppState};
use bidwatch_config::{Config, ConfigLoader, ConfigValidator};
use bidwatch_page_cdp::CdpPageSource;

/// `~/.bidwatch`, or `./.bidwatch` without a home directory.
pub(crate) fn bidwatch_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".bidwatch"))
        .unwrap_or_else(|| PathBuf::from(".bidwatch"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.bidwatch/logs/ with daily rotation.
pub(crate) fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = bidwatch_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("bidwatch")
        .filename_suffix("log")
        .max_log_files(14)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes buffered lines on exit.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cdp_endpoint: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(endpoint) = self.cdp_endpoint {
            config.browser.endpoint = endpoint;
        }
    }
}

/// Load, override and validate. A missing file yields defaults.
pub(crate) fn load_config(
    path: &Path,
    overrides: Overrides,
) -> Result<Config, Box<dyn std::error::Error>> {
    let path = PathBuf::from(ConfigLoader::expand_path(&path.to_string_lossy()));
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
    }
    let mut config = ConfigLoader::load_or_default(&path)?;
    overrides.apply(&mut config);

    let warnings = ConfigValidator::validate(&config).into_result()?;
    for warning in warnings {
        warn!("Config warning at {}: {}", warning.path, warning.message);
    }
    Ok(config)
}

/// Run the relay until Ctrl-C.
pub(crate) async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting BidWatch v{}", env!("CARGO_PKG_VERSION"));
    let config = Arc::new(config);

    let source = Arc::new(CdpPageSource::new(config.browser.clone()));
    match source.connect().await {
        Ok(()) => info!("Browser reachable at {}", config.browser.endpoint),
        // Sessions retry the connection on start.
        Err(e) => warn!("Browser not reachable yet: {}", e),
    }

    let (state, worker) = AppState::launch(config.clone(), source);
    let server = ApiServer::new(config.server.clone(), state.clone());
    server.run(shutdown_signal()).await?;

    info!("Shutting down");
    if let Err(e) = state.sessions.stop().await {
        warn!("Failed to stop session cleanly: {}", e);
    }
    worker.abort();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
