//! Error taxonomy shared across the workspace.

use std::path::PathBuf;

use thiserror::Error;

use crate::ids::{InstanceId, PlayerId};

/// Failure to bring an instance world into existence.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The template directory does not exist.
    #[error("template {template} not found at {}", .path.display())]
    TemplateMissing {
        /// Template name that was requested.
        template: String,
        /// Directory that was expected to hold the template world.
        path: PathBuf,
    },

    /// Copying the template tree failed part way. The partial directory is
    /// left in place for diagnosis.
    #[error("copying template {template} into {} failed: {source}", .destination.display())]
    CopyFailed {
        /// Template being copied.
        template: String,
        /// Instance directory being written.
        destination: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The host refused to load the copied world.
    #[error("host failed to load world {world}: {reason}")]
    WorldLoadFailed {
        /// World name handed to the host.
        world: String,
        /// Host-provided reason.
        reason: String,
    },

    /// A provisioning run for the same instance is still in flight.
    #[error("instance {0} is already provisioning")]
    AlreadyProvisioning(InstanceId),
}

/// Failure to tear an instance world down.
#[derive(Debug, Error)]
pub enum DecommissionError {
    /// The host refused to unload the world.
    #[error("host refused to unload world {world}: {reason}")]
    UnloadBlocked {
        /// World that stayed loaded.
        world: String,
        /// Host-provided reason.
        reason: String,
    },

    /// Deleting the instance directory failed. Retryable.
    #[error("deleting {} failed: {source}", .path.display())]
    DeleteFailed {
        /// Directory that could not be removed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// An entry into an instance world that did not come through a sanctioned
/// path. Always recovered by cancelling and relocating the player.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityViolation {
    /// A teleport targeted an instance world.
    #[error("player {player} attempted an illegal teleport into {world}")]
    IllegalTeleport {
        /// Offending player.
        player: PlayerId,
        /// Target world.
        world: String,
    },

    /// A world change (portal, login, respawn) targeted an instance world.
    #[error("player {player} attempted an illegal entry into {world}")]
    IllegalWorldEntry {
        /// Offending player.
        player: PlayerId,
        /// Target world.
        world: String,
    },
}

/// Errors reported by the host engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host declined the operation.
    #[error("host refused: {0}")]
    Refused(String),

    /// No world with this name is loaded.
    #[error("world not loaded: {0}")]
    UnknownWorld(String),

    /// The player is not online.
    #[error("player {0} is offline")]
    PlayerOffline(PlayerId),
}

/// Errors from submitting work to the authoritative thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The authoritative thread has shut down.
    #[error("authoritative thread has stopped")]
    Stopped,

    /// The task was dropped before producing a result (it panicked).
    #[error("authoritative task aborted before completing")]
    TaskAborted,
}
