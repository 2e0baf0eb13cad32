//! Gameplay events: kills, moves, world transitions and world lifecycle.
//!
//! The `handle_*` methods run on the authoritative thread, where the host
//! delivers its events. The `report_*` methods submit the same work from
//! anywhere else.

use std::sync::Arc;

use delves_access::security::EntryDecision;
use delves_conditions::tree::ConditionEvent;
use delves_core::authority::Tick;
use delves_core::event::{KillEvent, MoveEvent, TransitionAttempt, WorldLifecycle};
use delves_core::ids::{InstanceId, PlayerId};
use tracing::{debug, info, warn};

use super::probe::HostProbe;
use super::service::InstanceService;
use crate::domain::state::InstanceState;
use crate::error::InstanceError;
use crate::settings::to_delta;

impl InstanceService {
    /// Feeds a kill to the instance whose world it happened in. Returns
    /// `true` if the instance completed because of it.
    pub fn handle_kill(&self, tick: &Tick, event: &KillEvent) -> bool {
        match self.registry.find_by_world(&event.world) {
            Some(id) => self.feed(tick, id, ConditionEvent::Kill(event)),
            None => false,
        }
    }

    /// Feeds a move by an occupant to their instance. Returns `true` if the
    /// instance completed because of it.
    pub fn handle_move(&self, tick: &Tick, event: &MoveEvent) -> bool {
        let Some(id) = self.registry.find_by_world(&event.world) else {
            return false;
        };
        let is_occupant = self
            .registry
            .inspect(id, |instance| instance.has_occupant(event.player))
            .unwrap_or(false);
        is_occupant && self.feed(tick, id, ConditionEvent::Move(event))
    }

    /// Validates a world transition. Holding the access flag only opens
    /// the world of the instance the player occupies. A denied player is
    /// relocated to the primary spawn and leaves their instance; an allowed
    /// move out of an occupied instance world removes the player from that
    /// instance.
    pub fn validate_transition(&self, tick: &Tick, attempt: &TransitionAttempt) -> EntryDecision {
        let decision = match self.ctx.gate.validate_entry(attempt) {
            EntryDecision::Allow if self.enters_foreign_instance(attempt) => self.ctx.gate.deny(attempt),
            decision => decision,
        };
        if let EntryDecision::Deny(violation) = &decision {
            warn!(error = %violation, "cancelled illegal instance entry");
            self.relocate(tick, attempt.player);
        }
        self.leave_if_elsewhere(tick, attempt);
        decision
    }

    /// Logs world lifecycle events concerning instance worlds.
    pub fn handle_world_lifecycle(&self, _tick: &Tick, event: &WorldLifecycle) {
        match event {
            WorldLifecycle::Init(world) if self.ctx.pipeline.is_instance_world(world) => {
                debug!(world = %world, "instance world initialised");
            }
            WorldLifecycle::Load(world) if self.ctx.pipeline.is_instance_world(world) => {
                debug!(world = %world, "instance world loaded");
            }
            WorldLifecycle::Unload(world) if self.ctx.pipeline.is_instance_world(world) => {
                let tracked = self.registry.find_by_world(world).and_then(|id| {
                    self.registry
                        .inspect(id, |instance| (id, instance.state()))
                });
                match tracked {
                    Some((id, state)) if state != InstanceState::Deleting => {
                        warn!(instance_id = %id, world = %world, state = %state, "instance world unloaded outside decommission");
                    }
                    Some((id, _)) => debug!(instance_id = %id, world = %world, "instance world unloaded"),
                    None => debug!(world = %world, "untracked instance world unloaded"),
                }
            }
            _ => {}
        }
    }

    /// Submits a kill event to the authoritative thread.
    ///
    /// # Errors
    ///
    /// Returns `Authority` if the authoritative thread has stopped.
    pub async fn report_kill(&self, event: KillEvent) -> Result<bool, InstanceError> {
        let this = self.clone();
        Ok(self
            .ctx
            .authority
            .run(move |tick| this.handle_kill(tick, &event))
            .await?)
    }

    /// Submits a move event to the authoritative thread.
    ///
    /// # Errors
    ///
    /// Returns `Authority` if the authoritative thread has stopped.
    pub async fn report_move(&self, event: MoveEvent) -> Result<bool, InstanceError> {
        let this = self.clone();
        Ok(self
            .ctx
            .authority
            .run(move |tick| this.handle_move(tick, &event))
            .await?)
    }

    /// Submits a transition attempt to the authoritative thread.
    ///
    /// # Errors
    ///
    /// Returns `Authority` if the authoritative thread has stopped.
    pub async fn report_transition(
        &self,
        attempt: TransitionAttempt,
    ) -> Result<EntryDecision, InstanceError> {
        let this = self.clone();
        Ok(self
            .ctx
            .authority
            .run(move |tick| this.validate_transition(tick, &attempt))
            .await?)
    }

    /// Submits a world lifecycle event to the authoritative thread.
    ///
    /// # Errors
    ///
    /// Returns `Authority` if the authoritative thread has stopped.
    pub async fn report_world_lifecycle(&self, event: WorldLifecycle) -> Result<(), InstanceError> {
        let this = self.clone();
        Ok(self
            .ctx
            .authority
            .run(move |tick| this.handle_world_lifecycle(tick, &event))
            .await?)
    }

    fn feed(&self, tick: &Tick, id: InstanceId, event: ConditionEvent<'_>) -> bool {
        let engine = Arc::clone(&self.ctx.engine);
        let fed = self.registry.update(tick, id, |instance| {
            if instance.state() != InstanceState::Active {
                return false;
            }
            engine.handle_event(instance.conditions_mut(), event);
            true
        });
        fed == Some(true) && self.evaluate_completion(tick, id)
    }

    /// Completes instance `id` if it is active and its condition tree
    /// holds, then rewards everyone inside. Returns `true` if it completed
    /// now.
    pub(super) fn evaluate_completion(&self, tick: &Tick, id: InstanceId) -> bool {
        let now = self.ctx.clock.now();
        let grace = to_delta(self.ctx.settings.grace);
        let engine = Arc::clone(&self.ctx.engine);
        let host = self.ctx.host.as_ref();

        let completed = self
            .registry
            .update(tick, id, |instance| {
                if instance.state() != InstanceState::Active {
                    return None;
                }
                let world = instance.world().cloned()?;
                let occupants: Vec<PlayerId> = instance.occupants().collect();
                let probe = HostProbe {
                    host,
                    tick,
                    world: &world,
                    occupants: &occupants,
                };
                if !engine.is_complete(instance.conditions_mut(), &probe) {
                    return None;
                }
                match instance.complete(now, grace) {
                    Ok(true) => Some((instance.template().to_owned(), occupants)),
                    Ok(false) => None,
                    Err(e) => {
                        warn!(instance_id = %id, error = %e, "completion rejected");
                        None
                    }
                }
            })
            .flatten();

        let Some((template, occupants)) = completed else {
            return false;
        };
        info!(instance_id = %id, template = %template, occupants = occupants.len(), "instance completed");
        self.grant_rewards(tick, id, &template, &occupants);
        true
    }

    fn grant_rewards(&self, tick: &Tick, id: InstanceId, template: &str, occupants: &[PlayerId]) {
        let Some(template) = self.ctx.templates.get(template) else {
            return;
        };
        if template.rewards.is_empty() {
            return;
        }
        for player in occupants {
            if !self
                .ctx
                .transactions
                .grant_rewards(tick, *player, &template.rewards)
            {
                warn!(instance_id = %id, player = %player, "reward transaction was declined");
            }
        }
    }

    fn enters_foreign_instance(&self, attempt: &TransitionAttempt) -> bool {
        if attempt.admin_override || !self.ctx.gate.is_instance_world(&attempt.destination_world) {
            return false;
        }
        let home = self.occupied_by(attempt.player).and_then(|id| {
            self.registry
                .inspect(id, |instance| instance.world().map(|world| world.name().to_owned()))
                .flatten()
        });
        home.as_deref() != Some(attempt.destination_world.as_str())
    }

    fn leave_if_elsewhere(&self, tick: &Tick, attempt: &TransitionAttempt) {
        let Some(id) = self.occupied_by(attempt.player) else {
            return;
        };
        let elsewhere = self
            .registry
            .inspect(id, |instance| {
                instance
                    .world()
                    .is_some_and(|world| world.name() != attempt.destination_world)
            })
            .unwrap_or(false);
        if !elsewhere {
            return;
        }
        if let Err(e) = self.evict(tick, id, attempt.player, false) {
            warn!(instance_id = %id, player = %attempt.player, error = %e, "could not remove departing player");
        }
    }
}
