//! API Module
//!
//! HTTP API layer of the status server.

pub mod error;
pub mod health;
pub mod ledger;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ledger", get(ledger::list_entries))
        .route("/ledger/{name}", get(ledger::get_entry))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
