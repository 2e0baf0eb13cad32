//! Test host — an in-memory `WorldHost` that records what was asked of it.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

use delves_core::authority::Tick;
use delves_core::error::HostError;
use delves_core::host::{WorldHandle, WorldHost, WorldSpec};
use delves_core::ids::{EntityId, PlayerId};
use delves_core::location::{Location, WorldLocation};

#[derive(Debug, Default)]
struct HostState {
    loaded: HashMap<String, LoadedWorld>,
    hostiles: HashMap<String, Vec<EntityId>>,
    players: HashMap<PlayerId, WorldLocation>,
    offline: HashSet<PlayerId>,
    spawn_on_load: Vec<EntityId>,
    teleports: Vec<(PlayerId, WorldLocation)>,
    unloaded: Vec<String>,
    refuse_load: bool,
    refuse_unload: HashSet<String>,
}

#[derive(Debug, Clone)]
struct LoadedWorld {
    directory: PathBuf,
    auto_save: bool,
}

/// A world host backed by plain maps.
///
/// Worlds load if their directory exists. The primary world `world` is
/// loaded from the start and refuses to unload. Players count as online
/// until [`MockWorldHost::disconnect_player`] is called for them.
#[derive(Debug)]
pub struct MockWorldHost {
    state: Mutex<HostState>,
    primary_spawn: WorldLocation,
}

impl Default for MockWorldHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWorldHost {
    /// Creates a host with only the primary world loaded.
    #[must_use]
    pub fn new() -> Self {
        let mut state = HostState::default();
        state.loaded.insert(
            "world".to_owned(),
            LoadedWorld {
                directory: PathBuf::from("world"),
                auto_save: true,
            },
        );
        state.refuse_unload.insert("world".to_owned());
        Self {
            state: Mutex::new(state),
            primary_spawn: WorldLocation {
                world: "world".to_owned(),
                location: Location::at(0.0, 64.0, 0.0),
            },
        }
    }

    /// Makes every subsequent `load_world` fail.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn refuse_loads(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_load = refuse;
    }

    /// Makes `unload_world` fail for `world`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn refuse_unload(&self, world: &str) {
        self.state.lock().unwrap().refuse_unload.insert(world.to_owned());
    }

    /// Lets `world` unload again after [`MockWorldHost::refuse_unload`].
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn allow_unload(&self, world: &str) {
        self.state.lock().unwrap().refuse_unload.remove(world);
    }

    /// Sets the hostile entities alive in `world`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_hostiles(&self, world: &str, entities: Vec<EntityId>) {
        self.state
            .lock()
            .unwrap()
            .hostiles
            .insert(world.to_owned(), entities);
    }

    /// Populates every world loaded from now on with `entities`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn spawn_on_load(&self, entities: Vec<EntityId>) {
        self.state.lock().unwrap().spawn_on_load = entities;
    }

    /// Puts `player` online at `location`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn place_player(&self, player: PlayerId, location: WorldLocation) {
        let mut state = self.state.lock().unwrap();
        state.offline.remove(&player);
        state.players.insert(player, location);
    }

    /// Takes `player` offline. Teleports fail for them until they are
    /// placed again.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn disconnect_player(&self, player: PlayerId) {
        let mut state = self.state.lock().unwrap();
        state.players.remove(&player);
        state.offline.insert(player);
    }

    /// Returns where `player` currently is.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn location_of(&self, player: PlayerId) -> Option<WorldLocation> {
        self.state.lock().unwrap().players.get(&player).cloned()
    }

    /// Every teleport performed so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn teleports(&self) -> Vec<(PlayerId, WorldLocation)> {
        self.state.lock().unwrap().teleports.clone()
    }

    /// Returns `true` if `world` is loaded.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn is_loaded(&self, world: &str) -> bool {
        self.state.lock().unwrap().loaded.contains_key(world)
    }

    /// Returns whether `world` was loaded with auto-save enabled.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn auto_save_of(&self, world: &str) -> Option<bool> {
        self.state
            .lock()
            .unwrap()
            .loaded
            .get(world)
            .map(|loaded| loaded.auto_save)
    }

    /// Directory `world` was loaded from.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn directory_of(&self, world: &str) -> Option<PathBuf> {
        self.state
            .lock()
            .unwrap()
            .loaded
            .get(world)
            .map(|loaded| loaded.directory.clone())
    }

    /// Every world unloaded so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn unloaded(&self) -> Vec<String> {
        self.state.lock().unwrap().unloaded.clone()
    }
}

impl WorldHost for MockWorldHost {
    fn load_world(&self, _tick: &Tick, spec: &WorldSpec<'_>) -> Result<WorldHandle, HostError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_load {
            return Err(HostError::Refused("loading disabled".to_owned()));
        }
        if !spec.directory.is_dir() {
            return Err(HostError::Refused(format!(
                "{} is not a world directory",
                spec.directory.display()
            )));
        }
        state.loaded.insert(
            spec.name.to_owned(),
            LoadedWorld {
                directory: spec.directory.to_path_buf(),
                auto_save: spec.auto_save,
            },
        );
        if !state.spawn_on_load.is_empty() {
            let entities = state.spawn_on_load.clone();
            state.hostiles.insert(spec.name.to_owned(), entities);
        }
        Ok(WorldHandle::new(spec.name))
    }

    fn unload_world(&self, _tick: &Tick, name: &str) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_unload.contains(name) {
            return Err(HostError::Refused(format!("{name} cannot be unloaded")));
        }
        if state.loaded.remove(name).is_none() {
            return Err(HostError::UnknownWorld(name.to_owned()));
        }
        state.unloaded.push(name.to_owned());
        Ok(())
    }

    fn loaded_world(&self, _tick: &Tick, name: &str) -> Option<WorldHandle> {
        let state = self.state.lock().unwrap();
        state.loaded.contains_key(name).then(|| WorldHandle::new(name))
    }

    fn hostile_entities(&self, _tick: &Tick, world: &WorldHandle) -> Vec<EntityId> {
        self.state
            .lock()
            .unwrap()
            .hostiles
            .get(world.name())
            .cloned()
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
        let mut state = self.state.lock().unwrap();
        if state.offline.contains(&player) {
            return Err(HostError::PlayerOffline(player));
        }
        if !state.loaded.contains_key(&destination.world) {
            return Err(HostError::UnknownWorld(destination.world.clone()));
        }
        state.players.insert(player, destination.clone());
        state.teleports.push((player, destination.clone()));
        Ok(())
    }

    fn primary_spawn(&self) -> WorldLocation {
        self.primary_spawn.clone()
    }
}
