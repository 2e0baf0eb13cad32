//! Routes for creating, inspecting and managing instances.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use delves_core::ids::{InstanceId, PlayerId};
use delves_instances::application::{CreateInstance, DeletionOutcome, InstanceProgress};
use delves_instances::domain::instance::InstanceSummary;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateInstanceRequest {
    /// Template to instantiate.
    pub template: String,
    /// Requesting player.
    pub owner: PlayerId,
    /// Display name override.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Whether other players may join.
    #[serde(default)]
    pub public: bool,
}

/// Request body naming one player.
#[derive(Debug, Deserialize)]
pub struct PlayerRequest {
    /// The player concerned.
    pub player: PlayerId,
}

/// Request body for POST /{id}/extend.
#[derive(Debug, Deserialize)]
pub struct ExtendRequest {
    /// Seconds to add to the expiry.
    pub seconds: u64,
}

/// GET /
async fn list_instances(State(state): State<AppState>) -> Json<Vec<InstanceSummary>> {
    Json(state.service.list())
}

/// POST /
#[instrument(skip(state, request), fields(template = %request.template, owner = %request.owner))]
async fn create_instance(
    State(state): State<AppState>,
    Json(request): Json<CreateInstanceRequest>,
) -> Result<(StatusCode, Json<InstanceSummary>), ApiError> {
    let summary = state
        .service
        .create(CreateInstance {
            template: request.template,
            owner: request.owner,
            display_name: request.display_name,
            public: request.public,
        })
        .await?;
    info!(instance_id = %summary.id, "created instance");
    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /{id}
async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> Result<Json<InstanceSummary>, ApiError> {
    Ok(Json(state.service.get(id)?))
}

/// DELETE /{id}
#[instrument(skip(state), fields(instance_id = %id))]
async fn delete_instance(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> Result<Json<DeletionOutcome>, ApiError> {
    Ok(Json(state.service.delete(id).await?))
}

/// POST /{id}/join
#[instrument(skip(state, request), fields(instance_id = %id, player = %request.player))]
async fn join_instance(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
    Json(request): Json<PlayerRequest>,
) -> Result<Json<InstanceSummary>, ApiError> {
    Ok(Json(state.service.join(id, request.player).await?))
}

/// POST /{id}/kick
#[instrument(skip(state, request), fields(instance_id = %id, player = %request.player))]
async fn kick_player(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
    Json(request): Json<PlayerRequest>,
) -> Result<Json<InstanceSummary>, ApiError> {
    Ok(Json(state.service.kick(id, request.player).await?))
}

/// POST /{id}/extend
#[instrument(skip(state, request), fields(instance_id = %id, seconds = request.seconds))]
async fn extend_instance(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
    Json(request): Json<ExtendRequest>,
) -> Result<Json<InstanceSummary>, ApiError> {
    let by = Duration::from_secs(request.seconds);
    Ok(Json(state.service.extend(id, by).await?))
}

/// POST /{id}/restart
#[instrument(skip(state), fields(instance_id = %id))]
async fn restart_instance(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> Result<Json<InstanceSummary>, ApiError> {
    Ok(Json(state.service.restart(id).await?))
}

/// GET /{id}/progress
async fn instance_progress(
    State(state): State<AppState>,
    Path(id): Path<InstanceId>,
) -> Result<Json<InstanceProgress>, ApiError> {
    Ok(Json(state.service.progress(id).await?))
}

/// Returns the router for instance management.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_instances).post(create_instance))
        .route("/{id}", get(get_instance).delete(delete_instance))
        .route("/{id}/join", post(join_instance))
        .route("/{id}/kick", post(kick_player))
        .route("/{id}/extend", post(extend_instance))
        .route("/{id}/restart", post(restart_instance))
        .route("/{id}/progress", get(instance_progress))
}
