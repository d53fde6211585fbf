//! Ledger API Handlers
//!
//! Read-only view of the freshness markers. Nothing here writes to the store.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

use crate::AppState;
use crate::api::error::{ApiError, ApiResult};

/// Freshness marker of one crawler class
#[derive(Debug, Serialize)]
pub struct LedgerEntry {
    pub name: String,
    pub key: String,
    /// Seconds until the marker expires; `None` when there is no live marker
    pub remaining_secs: Option<u64>,
}

async fn entry(state: &AppState, name: &str) -> ApiResult<LedgerEntry> {
    let remaining = state.ledger.remaining(name).await?;
    Ok(LedgerEntry {
        name: name.to_string(),
        key: state.ledger.key_for(name),
        remaining_secs: remaining.map(|ttl| ttl.as_secs()),
    })
}

/// GET /ledger
/// Markers of every configured crawler class
pub async fn list_entries(State(state): State<AppState>) -> ApiResult<Json<Vec<LedgerEntry>>> {
    tracing::debug!("Listing ledger entries");

    let mut entries = Vec::with_capacity(state.classes.len());
    for name in state.classes.iter() {
        entries.push(entry(&state, name).await?);
    }

    Ok(Json(entries))
}

/// GET /ledger/{name}
/// Marker of one crawler class
pub async fn get_entry(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<LedgerEntry>> {
    if !state.classes.contains(&name) {
        return Err(ApiError::NotFound(format!(
            "Crawler class {} is not configured",
            name
        )));
    }

    Ok(Json(entry(&state, &name).await?))
}
