//! The instance registry.
//!
//! Readers take a read lock from any thread and get cloned snapshots.
//! Every insert, removal and mutation requires a [`Tick`], so they all run
//! on the authoritative thread and are totally ordered.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use delves_core::authority::Tick;
use delves_core::ids::{InstanceId, PlayerId};

use crate::domain::instance::{Instance, InstanceSummary};
use crate::domain::state::InstanceState;

/// Owns every live instance.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: RwLock<HashMap<InstanceId, Instance>>,
}

impl InstanceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `instance`.
    pub fn insert(&self, _tick: &Tick, instance: Instance) {
        self.write().insert(instance.id(), instance);
    }

    /// Stops tracking `id`, returning the record.
    pub fn remove(&self, _tick: &Tick, id: InstanceId) -> Option<Instance> {
        self.write().remove(&id)
    }

    /// Runs `f` against the instance with `id`.
    pub fn update<R>(
        &self,
        _tick: &Tick,
        id: InstanceId,
        f: impl FnOnce(&mut Instance) -> R,
    ) -> Option<R> {
        self.write().get_mut(&id).map(f)
    }

    /// Runs `f` against the instance with `id` under the read lock.
    pub fn inspect<R>(&self, id: InstanceId, f: impl FnOnce(&Instance) -> R) -> Option<R> {
        self.read().get(&id).map(f)
    }

    /// Snapshot of one instance. Instances still provisioning are not
    /// visible.
    #[must_use]
    pub fn summary(&self, id: InstanceId, now: DateTime<Utc>) -> Option<InstanceSummary> {
        self.read()
            .get(&id)
            .filter(|instance| instance.state() != InstanceState::Provisioning)
            .map(|instance| instance.summary(now))
    }

    /// Snapshots of every visible instance, oldest first.
    #[must_use]
    pub fn summaries(&self, now: DateTime<Utc>) -> Vec<InstanceSummary> {
        let mut summaries: Vec<InstanceSummary> = self
            .read()
            .values()
            .filter(|instance| instance.state() != InstanceState::Provisioning)
            .map(|instance| instance.summary(now))
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        summaries
    }

    /// Ids of every tracked instance, provisioning ones included.
    #[must_use]
    pub fn ids(&self) -> Vec<InstanceId> {
        self.read().keys().copied().collect()
    }

    /// Number of tracked instances, provisioning ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of tracked instances of `template`.
    #[must_use]
    pub fn count_template(&self, template: &str) -> usize {
        self.read()
            .values()
            .filter(|instance| instance.template() == template)
            .count()
    }

    /// The instance `player` is bound to: the one they occupy, or one they
    /// own that is still provisioning.
    #[must_use]
    pub fn instance_of(&self, player: PlayerId) -> Option<InstanceId> {
        self.read()
            .values()
            .find(|instance| {
                instance.has_occupant(player)
                    || (instance.owner() == player
                        && instance.state() == InstanceState::Provisioning)
            })
            .map(Instance::id)
    }

    /// The instance backed by `world`.
    #[must_use]
    pub fn find_by_world(&self, world: &str) -> Option<InstanceId> {
        self.read()
            .values()
            .find(|instance| instance.world().is_some_and(|handle| handle.name() == world))
            .map(Instance::id)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<InstanceId, Instance>> {
        self.instances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<InstanceId, Instance>> {
        self.instances.write().unwrap_or_else(PoisonError::into_inner)
    }
}
