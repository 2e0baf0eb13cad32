//! A world host kept entirely in memory.
//!
//! The server has no game engine attached. `LocalWorldHost` stands in for
//! one: it tracks which worlds are loaded, where players stand and which
//! hostiles are alive, fed by the gameplay ingest routes. A player is
//! online from their first recorded position until they disconnect.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use dashmap::{DashMap, DashSet};
use delves_core::authority::Tick;
use delves_core::error::HostError;
use delves_core::host::{WorldHandle, WorldHost, WorldSpec};
use delves_core::ids::{EntityId, PlayerId};
use delves_core::location::{Location, Position, WorldLocation};
use tracing::debug;

/// File whose presence marks a directory as a world save.
pub const LEVEL_FILE: &str = "level.dat";

/// In-memory world table.
#[derive(Debug)]
pub struct LocalWorldHost {
    primary_spawn: WorldLocation,
    worlds: DashMap<String, PathBuf>,
    hostiles: DashMap<String, HashSet<EntityId>>,
    players: DashMap<PlayerId, WorldLocation>,
    offline: DashSet<PlayerId>,
}

impl LocalWorldHost {
    /// Creates a host with only the primary world loaded.
    #[must_use]
    pub fn new(primary_spawn: WorldLocation) -> Self {
        let worlds = DashMap::new();
        worlds.insert(
            primary_spawn.world.clone(),
            PathBuf::from(&primary_spawn.world),
        );
        Self {
            primary_spawn,
            worlds,
            hostiles: DashMap::new(),
            players: DashMap::new(),
            offline: DashSet::new(),
        }
    }

    /// Records that `player` now stands at `position` in `world`.
    pub fn record_position(&self, player: PlayerId, world: &str, position: Position) {
        let facing = self
            .players
            .get(&player)
            .map(|current| (current.location.yaw, current.location.pitch))
            .unwrap_or_default();
        self.offline.remove(&player);
        self.players.insert(
            player,
            WorldLocation {
                world: world.to_owned(),
                location: Location {
                    position,
                    yaw: facing.0,
                    pitch: facing.1,
                },
            },
        );
    }

    /// Marks `player` offline and forgets where they were.
    pub fn forget_player(&self, player: PlayerId) {
        self.players.remove(&player);
        self.offline.insert(player);
    }

    /// Registers a hostile entity alive in `world`.
    pub fn spawn_hostile(&self, world: &str, entity: EntityId) {
        self.hostiles
            .entry(world.to_owned())
            .or_default()
            .insert(entity);
    }

    /// Removes a dead entity from `world`.
    pub fn remove_entity(&self, world: &str, entity: EntityId) {
        if let Some(mut alive) = self.hostiles.get_mut(world) {
            alive.remove(&entity);
        }
    }

    /// Number of hostiles alive in `world`.
    #[must_use]
    pub fn hostile_count(&self, world: &str) -> usize {
        self.hostiles.get(world).map_or(0, |alive| alive.len())
    }

    /// Names of every loaded world.
    #[must_use]
    pub fn loaded_worlds(&self) -> Vec<String> {
        let mut names: Vec<String> = self.worlds.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Where `player` currently is.
    #[must_use]
    pub fn location_of(&self, player: PlayerId) -> Option<WorldLocation> {
        self.players.get(&player).map(|entry| entry.value().clone())
    }
}

fn is_world_save(directory: &Path) -> bool {
    directory.join(LEVEL_FILE).is_file()
}

impl WorldHost for LocalWorldHost {
    fn load_world(&self, _tick: &Tick, spec: &WorldSpec<'_>) -> Result<WorldHandle, HostError> {
        if !is_world_save(spec.directory) {
            return Err(HostError::Refused(format!(
                "{} holds no {LEVEL_FILE}",
                spec.directory.display()
            )));
        }
        self.worlds
            .insert(spec.name.to_owned(), spec.directory.to_path_buf());
        debug!(world = spec.name, auto_save = spec.auto_save, "loaded world");
        Ok(WorldHandle::new(spec.name))
    }

    fn unload_world(&self, _tick: &Tick, name: &str) -> Result<(), HostError> {
        if name == self.primary_spawn.world {
            return Err(HostError::Refused(format!(
                "{name} is the primary world"
            )));
        }
        self.worlds
            .remove(name)
            .ok_or_else(|| HostError::UnknownWorld(name.to_owned()))?;
        self.hostiles.remove(name);
        debug!(world = name, "unloaded world");
        Ok(())
    }

    fn loaded_world(&self, _tick: &Tick, name: &str) -> Option<WorldHandle> {
        self.worlds
            .contains_key(name)
            .then(|| WorldHandle::new(name))
    }

    fn hostile_entities(&self, _tick: &Tick, world: &WorldHandle) -> Vec<EntityId> {
        self.hostiles
            .get(world.name())
            .map(|alive| alive.iter().copied().collect())
            .unwrap_or_default()
    }

    fn player_location(&self, _tick: &Tick, player: PlayerId) -> Option<WorldLocation> {
        self.location_of(player)
    }

    fn teleport(
        &self,
        _tick: &Tick,
        player: PlayerId,
        destination: &WorldLocation,
    ) -> Result<(), HostError> {
        if self.offline.contains(&player) {
            return Err(HostError::PlayerOffline(player));
        }
        if !self.worlds.contains_key(&destination.world) {
            return Err(HostError::UnknownWorld(destination.world.clone()));
        }
        self.players.insert(player, destination.clone());
        Ok(())
    }

    fn primary_spawn(&self) -> WorldLocation {
        self.primary_spawn.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use delves_core::authority::Authority;
    use uuid::Uuid;

    use super::*;

    fn host() -> Arc<LocalWorldHost> {
        Arc::new(LocalWorldHost::new(WorldLocation {
            world: "world".to_owned(),
            location: Location::at(0.0, 64.0, 0.0),
        }))
    }

    #[tokio::test]
    async fn test_load_requires_level_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let save = dir.path().join("dungeon_a");
        std::fs::create_dir(&save).unwrap();
        let host = host();
        let thread = Authority::spawn("host-test").unwrap();

        // Act
        let h = Arc::clone(&host);
        let path = save.clone();
        let refused = thread
            .authority()
            .run(move |tick| {
                h.load_world(
                    tick,
                    &WorldSpec {
                        name: "dungeon_a",
                        directory: &path,
                        auto_save: false,
                    },
                )
                .is_err()
            })
            .await
            .unwrap();
        std::fs::write(save.join(LEVEL_FILE), b"level").unwrap();
        let h = Arc::clone(&host);
        let loaded = thread
            .authority()
            .run(move |tick| {
                h.load_world(
                    tick,
                    &WorldSpec {
                        name: "dungeon_a",
                        directory: &save,
                        auto_save: false,
                    },
                )
            })
            .await
            .unwrap();

        // Assert
        assert!(refused);
        assert_eq!(loaded.unwrap().name(), "dungeon_a");
        assert_eq!(host.loaded_worlds(), vec!["dungeon_a".to_owned(), "world".to_owned()]);
        thread.shutdown();
    }

    #[tokio::test]
    async fn test_primary_world_cannot_be_unloaded() {
        let host = host();
        let thread = Authority::spawn("host-test").unwrap();

        let h = Arc::clone(&host);
        let result = thread
            .authority()
            .run(move |tick| h.unload_world(tick, "world"))
            .await
            .unwrap();

        assert!(matches!(result, Err(HostError::Refused(_))));
        thread.shutdown();
    }

    #[tokio::test]
    async fn test_hostiles_follow_spawns_and_deaths() {
        // Arrange
        let host = host();
        let thread = Authority::spawn("host-test").unwrap();
        let (a, b) = (
            EntityId::from_uuid(Uuid::new_v4()),
            EntityId::from_uuid(Uuid::new_v4()),
        );
        host.spawn_hostile("world", a);
        host.spawn_hostile("world", b);

        // Act
        host.remove_entity("world", a);
        let h = Arc::clone(&host);
        let alive = thread
            .authority()
            .run(move |tick| h.hostile_entities(tick, &WorldHandle::new("world")))
            .await
            .unwrap();

        // Assert
        assert_eq!(alive, vec![b]);
        thread.shutdown();
    }

    #[tokio::test]
    async fn test_teleport_into_unloaded_world_fails() {
        let host = host();
        let thread = Authority::spawn("host-test").unwrap();
        let player = PlayerId::from_uuid(Uuid::new_v4());

        let h = Arc::clone(&host);
        let result = thread
            .authority()
            .run(move |tick| {
                h.teleport(
                    tick,
                    player,
                    &WorldLocation {
                        world: "dungeon_missing".to_owned(),
                        location: Location::at(0.0, 0.0, 0.0),
                    },
                )
            })
            .await
            .unwrap();

        assert!(matches!(result, Err(HostError::UnknownWorld(_))));
        assert!(host.location_of(player).is_none());
        thread.shutdown();
    }

    #[tokio::test]
    async fn test_teleport_of_offline_player_fails_until_they_return() {
        // Arrange
        let host = host();
        let thread = Authority::spawn("host-test").unwrap();
        let player = PlayerId::from_uuid(Uuid::new_v4());
        host.record_position(player, "world", Position::new(1.0, 64.0, 1.0));
        host.forget_player(player);
        let spawn = host.primary_spawn();

        // Act
        let h = Arc::clone(&host);
        let target = spawn.clone();
        let offline = thread
            .authority()
            .run(move |tick| h.teleport(tick, player, &target))
            .await
            .unwrap();
        host.record_position(player, "world", Position::new(2.0, 64.0, 2.0));
        let h = Arc::clone(&host);
        let online = thread
            .authority()
            .run(move |tick| h.teleport(tick, player, &spawn))
            .await
            .unwrap();

        // Assert
        assert_eq!(offline, Err(HostError::PlayerOffline(player)));
        assert_eq!(online, Ok(()));
        assert_eq!(host.location_of(player).unwrap().world, "world");
        thread.shutdown();
    }

    #[test]
    fn test_record_position_keeps_facing() {
        let host = host();
        let player = PlayerId::from_uuid(Uuid::new_v4());
        host.players.insert(
            player,
            WorldLocation {
                world: "world".to_owned(),
                location: Location {
                    position: Position::new(0.0, 64.0, 0.0),
                    yaw: 90.0,
                    pitch: 10.0,
                },
            },
        );

        host.record_position(player, "world", Position::new(3.0, 64.0, 4.0));

        let location = host.location_of(player).unwrap();
        assert_eq!(location.location.position, Position::new(3.0, 64.0, 4.0));
        assert!((location.location.yaw - 90.0).abs() < f32::EPSILON);
    }
}
