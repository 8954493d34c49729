pub mod auth;
pub mod config;
pub mod health;
pub mod rate_limit;
pub mod registry;
pub mod router;
pub mod state;
pub mod sweeper;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use auth::{DenyAllVerifier, HmacTokenVerifier, TokenVerifier};
use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config. Does not
/// start the idle sweeper; call [`spawn_idle_sweeper`] separately so tests
/// that don't need it can skip the background task.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let verifier: Arc<dyn TokenVerifier> = match &config.auth.token_secret {
        Some(secret) => Arc::new(HmacTokenVerifier::new(secret.clone())),
        None => Arc::new(DenyAllVerifier),
    };
    let state = AppState::new(config, verifier);

    let app = Router::new()
        .route("/", axum::routing::get(ws::ws_handler))
        .route("/health", axum::routing::get(health::health_check))
        .with_state(state.clone());

    (app, state)
}

/// Spawn the idle-room sweeper as configured. Returns immediately; the task
/// runs until `state.shutdown` is cancelled.
pub fn spawn_idle_sweeper(state: &AppState) {
    sweeper::spawn_idle_sweeper(
        Arc::clone(&state.registry),
        Duration::from_secs(state.config.rooms.sweep_interval_secs),
        Duration::from_secs(state.config.rooms.idle_ttl_secs),
        state.shutdown.clone(),
    );
}
