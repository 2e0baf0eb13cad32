//! Instance service errors.

use delves_core::error::{AuthorityError, DecommissionError, HostError, ProvisioningError};
use delves_core::ids::{InstanceId, PlayerId};
use thiserror::Error;

use crate::domain::state::InstanceState;

/// A lifecycle transition the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("instance {id} cannot move from {from} to {to}")]
pub struct TransitionError {
    /// Instance that was asked to move.
    pub id: InstanceId,
    /// State it was in.
    pub from: InstanceState,
    /// State it was asked to enter.
    pub to: InstanceState,
}

/// Errors surfaced by the instance service.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// No visible instance with this id.
    #[error("instance not found: {0}")]
    NotFound(InstanceId),

    /// The template is not in the catalog.
    #[error("template not configured: {0}")]
    UnknownTemplate(String),

    /// The player created an instance too recently.
    #[error("player {player} must wait {remaining_secs}s before creating another instance")]
    Cooldown {
        /// Requesting player.
        player: PlayerId,
        /// Seconds until creation is allowed again.
        remaining_secs: u64,
    },

    /// The global instance cap is reached.
    #[error("instance limit of {limit} reached")]
    CapacityReached {
        /// Configured cap.
        limit: usize,
    },

    /// The per-template instance cap is reached.
    #[error("template {template} is limited to {limit} concurrent instances")]
    TemplateCapacityReached {
        /// Template name.
        template: String,
        /// Configured cap.
        limit: usize,
    },

    /// The instance has no room for another occupant.
    #[error("instance {0} is full")]
    Full(InstanceId),

    /// The instance is private and the player is not its owner.
    #[error("instance {0} is private")]
    Private(InstanceId),

    /// The player already occupies or is provisioning an instance.
    #[error("player {player} is already in instance {instance}")]
    AlreadyInInstance {
        /// Requesting player.
        player: PlayerId,
        /// Instance the player is bound to.
        instance: InstanceId,
    },

    /// The player is not in any instance.
    #[error("player {0} is not in an instance")]
    NotInInstance(PlayerId),

    /// The operation needs an ACTIVE instance.
    #[error("instance {id} is {state}, not ACTIVE")]
    NotActive {
        /// Instance id.
        id: InstanceId,
        /// Its current state.
        state: InstanceState,
    },

    /// The requirement transaction was declined.
    #[error("player {0} does not meet the template requirements")]
    RequirementsUnmet(PlayerId),

    /// The state machine rejected a transition.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Provisioning failed; no instance was created.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// Decommissioning failed.
    #[error(transparent)]
    Decommission(#[from] DecommissionError),

    /// The host rejected a world operation.
    #[error(transparent)]
    Host(#[from] HostError),

    /// The authoritative thread is unavailable.
    #[error(transparent)]
    Authority(#[from] AuthorityError),
}
