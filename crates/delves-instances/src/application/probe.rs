//! World probe backed by the live host.

use delves_conditions::tree::WorldProbe;
use delves_core::authority::Tick;
use delves_core::host::{WorldHandle, WorldHost};
use delves_core::ids::{EntityId, PlayerId};
use delves_core::location::Position;

/// Answers condition queries about one instance world by asking the host.
pub(crate) struct HostProbe<'a> {
    pub(crate) host: &'a dyn WorldHost,
    pub(crate) tick: &'a Tick,
    pub(crate) world: &'a WorldHandle,
    pub(crate) occupants: &'a [PlayerId],
}

impl WorldProbe for HostProbe<'_> {
    fn hostile_entities(&self) -> Vec<EntityId> {
        self.host.hostile_entities(self.tick, self.world)
    }

    fn occupant_positions(&self) -> Vec<Position> {
        self.occupants
            .iter()
            .filter_map(|player| self.host.player_location(self.tick, *player))
            .filter(|location| location.world == self.world.name())
            .map(|location| location.location.position)
            .collect()
    }
}
