//! Gameplay ingest: the events a game engine would deliver to the
//! authoritative thread, posted over HTTP instead.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use delves_access::security::EntryDecision;
use delves_core::event::{KillEvent, MoveEvent, TransitionAttempt, WorldLifecycle};
use delves_core::ids::EntityId;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /spawn.
#[derive(Debug, Deserialize)]
pub struct SpawnRequest {
    /// World the entity appeared in.
    pub world: String,
    /// The hostile entity.
    pub entity: EntityId,
}

/// Response body for kill and move events.
#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    /// Whether the event completed an instance.
    pub completed: bool,
}

/// Response body for POST /teleport.
#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    /// Whether the transition may proceed.
    pub allowed: bool,
    /// Why it was refused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Acknowledgement for events with no result.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    /// Always `true`.
    pub accepted: bool,
}

/// POST /kill
#[instrument(skip(state, event), fields(world = %event.world))]
async fn kill(
    State(state): State<AppState>,
    Json(event): Json<KillEvent>,
) -> Result<Json<CompletionResponse>, ApiError> {
    state.host.remove_entity(&event.world, event.entity);
    let completed = state.service.report_kill(event).await?;
    Ok(Json(CompletionResponse { completed }))
}

/// POST /move
async fn player_move(
    State(state): State<AppState>,
    Json(event): Json<MoveEvent>,
) -> Result<Json<CompletionResponse>, ApiError> {
    state
        .host
        .record_position(event.player, &event.world, event.position);
    let completed = state.service.report_move(event).await?;
    Ok(Json(CompletionResponse { completed }))
}

/// POST /teleport
#[instrument(skip(state, attempt), fields(player = %attempt.player, world = %attempt.destination_world))]
async fn teleport(
    State(state): State<AppState>,
    Json(attempt): Json<TransitionAttempt>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let decision = state.service.report_transition(attempt).await?;
    Ok(Json(match decision {
        EntryDecision::Allow => TransitionResponse {
            allowed: true,
            reason: None,
        },
        EntryDecision::Deny(violation) => TransitionResponse {
            allowed: false,
            reason: Some(violation.to_string()),
        },
    }))
}

/// POST /spawn
async fn spawn(
    State(state): State<AppState>,
    Json(request): Json<SpawnRequest>,
) -> Json<AckResponse> {
    debug!(world = %request.world, entity = %request.entity, "hostile spawned");
    state.host.spawn_hostile(&request.world, request.entity);
    Json(AckResponse { accepted: true })
}

/// POST /world
async fn world_lifecycle(
    State(state): State<AppState>,
    Json(event): Json<WorldLifecycle>,
) -> Result<Json<AckResponse>, ApiError> {
    state.service.report_world_lifecycle(event).await?;
    Ok(Json(AckResponse { accepted: true }))
}

/// Returns the router for gameplay ingest.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/kill", post(kill))
        .route("/move", post(player_move))
        .route("/teleport", post(teleport))
        .route("/spawn", post(spawn))
        .route("/world", post(world_lifecycle))
}
