//! API server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bidwatch_config::ServerConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::http::routes::create_router;
use crate::state::AppState;

/// Serves the control plane and the viewer WebSocket on one listener.
pub struct ApiServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Serve until `shutdown` resolves. In-flight requests are allowed to
    /// finish; open WebSockets are dropped.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self.addr().parse()?;
        let listener = TcpListener::bind(addr).await?;

        info!("API server listening on {}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bidwatch_config::Config;
    use bidwatch_core::testing::{ScriptedPage, ScriptedSource};

    fn create_test_state() -> Arc<AppState> {
        let source = ScriptedSource::new(ScriptedPage::new());
        AppState::launch(Arc::new(Config::default()), source).0
    }

    #[tokio::test]
    async fn test_server_addr() {
        let server = ApiServer::new(ServerConfig::default(), create_test_state());
        assert_eq!(server.addr(), "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        };
        let server = ApiServer::new(config, create_test_state());
        server.run(async {}).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_rejects_bad_host() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            port: 80,
        };
        let server = ApiServer::new(config, create_test_state());
        assert!(server.run(async {}).await.is_err());
    }
}
