//! Gameplay events consumed from the host.

use serde::{Deserialize, Serialize};

use crate::ids::{EntityId, PlayerId};
use crate::location::Position;

/// An entity died.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillEvent {
    /// World the entity died in.
    pub world: String,
    /// Player credited with the kill, if any.
    #[serde(default)]
    pub killer: Option<PlayerId>,
    /// The entity that died.
    pub entity: EntityId,
    /// Base entity type name (for example `zombie`).
    pub entity_type: String,
    /// Custom display name, if the entity had one.
    #[serde(default)]
    pub custom_name: Option<String>,
}

impl KillEvent {
    /// Returns `true` if `name` matches the base type or the custom name,
    /// ignoring ASCII case.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.entity_type.eq_ignore_ascii_case(name)
            || self
                .custom_name
                .as_deref()
                .is_some_and(|custom| custom.eq_ignore_ascii_case(name))
    }
}

/// A player moved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveEvent {
    /// Who moved.
    pub player: PlayerId,
    /// World the player is in.
    pub world: String,
    /// New position.
    pub position: Position,
}

/// How a player is trying to reach another world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Explicit teleport (command, ender pearl, plugin).
    Teleport,
    /// Portal, respawn, login or other world change.
    WorldChange,
}

/// A player is about to enter a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionAttempt {
    /// Who is moving.
    pub player: PlayerId,
    /// World being entered.
    pub destination_world: String,
    /// How the transition was triggered.
    pub cause: TransitionCause,
    /// Whether the player holds the administrative bypass permission.
    #[serde(default)]
    pub admin_override: bool,
}

/// World lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "world", rename_all = "snake_case")]
pub enum WorldLifecycle {
    /// The host initialised a world.
    Init(String),
    /// The host finished loading a world.
    Load(String),
    /// The host unloaded a world.
    Unload(String),
}
