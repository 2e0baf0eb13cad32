//! Routes for player departures.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use delves_core::ids::{InstanceId, PlayerId};
use delves_instances::domain::instance::InstanceSummary;
use serde::Serialize;
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for POST /{id}/disconnect.
#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    /// Instance the player was removed from, if any.
    pub instance: Option<InstanceId>,
}

/// POST /{id}/leave
#[instrument(skip(state), fields(player = %player))]
async fn leave_instance(
    State(state): State<AppState>,
    Path(player): Path<PlayerId>,
) -> Result<Json<InstanceSummary>, ApiError> {
    Ok(Json(state.service.leave(player).await?))
}

/// POST /{id}/disconnect
#[instrument(skip(state), fields(player = %player))]
async fn disconnect_player(
    State(state): State<AppState>,
    Path(player): Path<PlayerId>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    state.host.forget_player(player);
    let instance = state.service.disconnect(player).await?;
    Ok(Json(DisconnectResponse { instance }))
}

/// Returns the router for player routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/leave", post(leave_instance))
        .route("/{id}/disconnect", post(disconnect_player))
}
