pub mod dto;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Ledger endpoints (CSV request body)
        .route("/api/v1/ledger/summary", post(handlers::summarize_ledger))
        .route("/api/v1/ledger/rows", post(handlers::ledger_rows))
}
