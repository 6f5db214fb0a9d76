//! HTTP query surface
//!
//! Pull endpoints for status and history; push flows through the WebSocket.

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use super::AppState;
use crate::polls::{HistoryEntry, StatusSnapshot};

/// Liveness probe.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /api/poll-status`
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.coordinator.status())
}

/// `GET /api/poll-history` — concluded polls, newest first.
pub async fn history_handler(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(state.coordinator.history())
}
