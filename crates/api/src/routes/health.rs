//! Health check endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
    pub revocation_store: String,
    pub chat: Option<ChatHealth>,
}

#[derive(Serialize)]
pub struct ChatHealth {
    pub rooms: usize,
    pub participants: usize,
}

fn label(ok: bool) -> String {
    let label = if ok { "healthy" } else { "unhealthy" };
    label.to_string()
}

async fn dependencies_ok(state: &AppState) -> (bool, bool) {
    let database = state.accounts.ping().await.is_ok();
    let revocation_store = state.jwt_manager.revocations().ping().await.is_ok();
    (database, revocation_store)
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (database, revocation_store) = dependencies_ok(&state).await;
    let chat = state.hub.stats().await.map(|stats| ChatHealth {
        rooms: stats.rooms,
        participants: stats.participants,
    });

    let healthy = database && revocation_store && chat.is_some();
    let overall_status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        overall_status,
        Json(HealthResponse {
            status: label(healthy),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: label(database),
            revocation_store: label(revocation_store),
            chat,
        }),
    )
}

/// Liveness probe (just returns 200 if the server is running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe (database and revocation store must both answer)
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match dependencies_ok(&state).await {
        (true, true) => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}
