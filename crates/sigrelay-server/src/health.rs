use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response, for operators running the hub behind
/// a load balancer.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: usize,
    pub rooms: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.connection_count.load(Ordering::Relaxed);
    let rooms = state.registry.room_count().await;

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections,
        rooms,
    })
}
