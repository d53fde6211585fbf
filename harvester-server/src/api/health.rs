//! Liveness endpoint

use axum::{Json, extract::State};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    /// Crawler classes this node reports on
    pub crawler_classes: usize,
}

/// GET /health
///
/// Answers without touching the ledger store.
pub async fn health_check(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        crawler_classes: state.classes.len(),
    })
}
