//! Harvester Server
//!
//! Small HTTP status server run by the server subsystem. It reports liveness
//! and the freshness markers of the configured crawler classes.

pub mod api;

use harvester_core::config::ServerConfig;
use harvester_ledger::FreshnessLedger;
use std::future::Future;
use std::sync::Arc;

pub use api::create_router;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub ledger: FreshnessLedger,
    pub classes: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(ledger: FreshnessLedger, classes: Vec<String>) -> Self {
        Self {
            ledger,
            classes: Arc::new(classes),
        }
    }
}

/// Binds `config.host:config.port` and serves until `shutdown` resolves
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
