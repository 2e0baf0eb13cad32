//! Route modules organized by concern.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod events;
pub mod health;
pub mod instances;
pub mod players;

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/instances", instances::router())
        .nest("/api/v1/players", players::router())
        .nest("/api/v1/events", events::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
