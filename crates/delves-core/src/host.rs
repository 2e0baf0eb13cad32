//! Capability interface to the host game engine.
//!
//! The engine itself lives outside this workspace. Everything the core needs
//! from it is expressed by [`WorldHost`]; world-mutating calls require a
//! [`Tick`] so they can only be issued from the authoritative thread.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::authority::Tick;
use crate::error::HostError;
use crate::ids::{EntityId, PlayerId};
use crate::location::WorldLocation;

/// A live world registered with the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldHandle {
    name: String,
}

impl WorldHandle {
    /// Creates a handle for the world called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the world name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Parameters for loading a world from disk.
#[derive(Debug, Clone, Copy)]
pub struct WorldSpec<'a> {
    /// Name to register the world under.
    pub name: &'a str,
    /// Directory holding the world save.
    pub directory: &'a Path,
    /// Whether the host should periodically persist the world.
    pub auto_save: bool,
}

/// Operations the host engine exposes to the instance manager.
pub trait WorldHost: Send + Sync {
    /// Creates or loads a world from `spec.directory`.
    ///
    /// # Errors
    ///
    /// Returns `HostError` if the host refuses to load the directory.
    fn load_world(&self, tick: &Tick, spec: &WorldSpec<'_>) -> Result<WorldHandle, HostError>;

    /// Unloads the named world without saving it.
    ///
    /// # Errors
    ///
    /// Returns `HostError::Refused` if the host will not unload it (for
    /// example the primary world) and `HostError::UnknownWorld` if it is not
    /// loaded.
    fn unload_world(&self, tick: &Tick, name: &str) -> Result<(), HostError>;

    /// Looks up a loaded world by name.
    fn loaded_world(&self, tick: &Tick, name: &str) -> Option<WorldHandle>;

    /// Returns the ids of hostile entities currently alive in `world`.
    fn hostile_entities(&self, tick: &Tick, world: &WorldHandle) -> Vec<EntityId>;

    /// Returns where the player currently is, if online.
    fn player_location(&self, tick: &Tick, player: PlayerId) -> Option<WorldLocation>;

    /// Moves a player to `destination`.
    ///
    /// # Errors
    ///
    /// Returns `HostError` if the player is offline or the world is not
    /// loaded.
    fn teleport(
        &self,
        tick: &Tick,
        player: PlayerId,
        destination: &WorldLocation,
    ) -> Result<(), HostError>;

    /// Returns the spawn point of the primary world.
    fn primary_spawn(&self) -> WorldLocation;
}
