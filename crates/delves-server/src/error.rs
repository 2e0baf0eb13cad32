//! Delves server error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use delves_core::error::ProvisioningError;
use delves_instances::error::InstanceError;
use serde::Serialize;
use thiserror::Error;

use crate::catalog::CatalogError;

/// Startup and runtime errors for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A configuration variable is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The template catalog could not be loaded.
    #[error("template catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// An instance operation failed during startup or shutdown.
    #[error("instance error: {0}")]
    Instance(#[from] InstanceError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `InstanceError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub InstanceError);

impl From<InstanceError> for ApiError {
    fn from(err: InstanceError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            InstanceError::NotFound(_) => (StatusCode::NOT_FOUND, "instance_not_found"),
            InstanceError::UnknownTemplate(_) => (StatusCode::NOT_FOUND, "unknown_template"),
            InstanceError::NotInInstance(_) => (StatusCode::NOT_FOUND, "not_in_instance"),
            InstanceError::Cooldown { .. } => (StatusCode::TOO_MANY_REQUESTS, "cooldown"),
            InstanceError::CapacityReached { .. } | InstanceError::TemplateCapacityReached { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "capacity_reached")
            }
            InstanceError::Private(_) => (StatusCode::FORBIDDEN, "instance_private"),
            InstanceError::RequirementsUnmet(_) => (StatusCode::FORBIDDEN, "requirements_unmet"),
            InstanceError::Full(_) => (StatusCode::CONFLICT, "instance_full"),
            InstanceError::AlreadyInInstance { .. } => (StatusCode::CONFLICT, "already_in_instance"),
            InstanceError::NotActive { .. } => (StatusCode::CONFLICT, "instance_not_active"),
            InstanceError::InvalidTransition(_) => (StatusCode::CONFLICT, "invalid_transition"),
            InstanceError::Provisioning(ProvisioningError::AlreadyProvisioning(_)) => {
                (StatusCode::CONFLICT, "already_provisioning")
            }
            InstanceError::Provisioning(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "provisioning_failed")
            }
            InstanceError::Decommission(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "decommission_failed")
            }
            InstanceError::Host(_) => (StatusCode::BAD_GATEWAY, "host_error"),
            InstanceError::Authority(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "authority_unavailable")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
