//! The instance service: creation, membership and read paths.

use std::sync::Arc;
use std::time::Duration;

use delves_conditions::tree::EntryReport;
use delves_core::authority::Tick;
use delves_core::host::WorldHandle;
use delves_core::ids::{InstanceId, PlayerId};
use delves_core::location::WorldLocation;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::context::InstanceContext;
use super::probe::HostProbe;
use crate::domain::instance::{Instance, InstanceSummary, NewInstance};
use crate::domain::state::InstanceState;
use crate::domain::template::Template;
use crate::error::InstanceError;
use crate::registry::InstanceRegistry;
use crate::settings::to_delta;

/// A request to create an instance.
#[derive(Debug, Clone)]
pub struct CreateInstance {
    /// Template to instantiate.
    pub template: String,
    /// Requesting player, who becomes the owner and first occupant.
    pub owner: PlayerId,
    /// Display name. Defaults to the template's display name.
    pub display_name: Option<String>,
    /// Whether other players may join.
    pub public: bool,
}

/// Completion progress of one instance.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceProgress {
    /// The instance itself.
    #[serde(flatten)]
    pub summary: InstanceSummary,
    /// Overall progress in `[0, 1]`.
    pub overall: f64,
    /// Per-entry progress, highest priority first.
    pub entries: Vec<EntryReport>,
}

/// Drives instances through their lifecycle.
///
/// Cheap to clone. Every state change is executed on the authoritative
/// thread; the async methods submit the work there and await the result.
#[derive(Debug, Clone)]
pub struct InstanceService {
    pub(super) ctx: Arc<InstanceContext>,
    pub(super) registry: Arc<InstanceRegistry>,
}

impl InstanceService {
    /// Creates a service with an empty registry.
    #[must_use]
    pub fn new(ctx: InstanceContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            registry: Arc::new(InstanceRegistry::new()),
        }
    }

    /// The collaborators this service was built from.
    #[must_use]
    pub fn context(&self) -> &InstanceContext {
        &self.ctx
    }

    /// The registry of live instances.
    #[must_use]
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Every visible instance, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<InstanceSummary> {
        self.registry.summaries(self.ctx.clock.now())
    }

    /// One visible instance.
    ///
    /// # Errors
    ///
    /// Returns `InstanceError::NotFound` if no visible instance has `id`.
    pub fn get(&self, id: InstanceId) -> Result<InstanceSummary, InstanceError> {
        self.registry
            .summary(id, self.ctx.clock.now())
            .ok_or(InstanceError::NotFound(id))
    }

    /// Creates an instance of `request.template` and moves the owner in.
    ///
    /// Cooldown, occupancy and capacity are checked and requirements are
    /// taken before anything touches the disk. If provisioning fails the
    /// reservation is dropped and requirements are refunded; no instance
    /// ever becomes visible.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTemplate`, `Cooldown`, `AlreadyInInstance`,
    /// `CapacityReached`, `TemplateCapacityReached` or `RequirementsUnmet`
    /// when the request is refused, and `Provisioning` when the world could
    /// not be created.
    pub async fn create(&self, request: CreateInstance) -> Result<InstanceSummary, InstanceError> {
        let template = self
            .ctx
            .templates
            .get(&request.template)
            .cloned()
            .ok_or_else(|| InstanceError::UnknownTemplate(request.template.clone()))?;
        let owner = request.owner;
        let now_millis = self.ctx.clock.now_millis();
        let remaining_secs =
            self.ctx
                .cooldowns
                .remaining_seconds(owner, template.cooldown_secs, now_millis);
        if remaining_secs > 0 {
            return Err(InstanceError::Cooldown {
                player: owner,
                remaining_secs,
            });
        }

        let this = self.clone();
        let reserved = template.clone();
        let id = self
            .ctx
            .authority
            .run(move |tick| this.reserve(tick, &request, &reserved))
            .await??;

        let provisioned = self.ctx.pipeline.provision(&template.name, id).await;
        match provisioned {
            Ok(world) => {
                let this = self.clone();
                self.ctx
                    .authority
                    .run(move |tick| this.activate(tick, id, world, &template, now_millis))
                    .await?
            }
            Err(e) => {
                warn!(instance_id = %id, template = %template.name, error = %e, "provisioning failed");
                let this = self.clone();
                let requirements = template.requirements;
                let refunded = self
                    .ctx
                    .authority
                    .run(move |tick| {
                        this.registry.remove(tick, id);
                        this.ctx
                            .transactions
                            .refund_requirements(tick, owner, &requirements)
                    })
                    .await?;
                if !refunded {
                    warn!(instance_id = %id, player = %owner, "requirement refund was declined");
                }
                Err(e.into())
            }
        }
    }

    /// Moves `player` into an active instance.
    ///
    /// Joining the instance one already occupies is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, `NotActive`, `Private`, `Full` or
    /// `AlreadyInInstance` when refused and `Host` if the teleport failed.
    pub async fn join(&self, id: InstanceId, player: PlayerId) -> Result<InstanceSummary, InstanceError> {
        let this = self.clone();
        self.ctx
            .authority
            .run(move |tick| this.join_on_tick(tick, id, player))
            .await?
    }

    /// Takes `player` out of their instance and back to the primary spawn.
    ///
    /// # Errors
    ///
    /// Returns `NotInInstance` if the player occupies no instance.
    pub async fn leave(&self, player: PlayerId) -> Result<InstanceSummary, InstanceError> {
        let this = self.clone();
        self.ctx
            .authority
            .run(move |tick| {
                let id = this
                    .occupied_by(player)
                    .ok_or(InstanceError::NotInInstance(player))?;
                this.evict(tick, id, player, true)?;
                this.summary_or_not_found(id)
            })
            .await?
    }

    /// Removes `player` from instance `id` and relocates them.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown instance and `NotInInstance` if the
    /// player is not inside it.
    pub async fn kick(&self, id: InstanceId, player: PlayerId) -> Result<InstanceSummary, InstanceError> {
        let this = self.clone();
        self.ctx
            .authority
            .run(move |tick| {
                let inside = this
                    .registry
                    .inspect(id, |instance| instance.has_occupant(player))
                    .ok_or(InstanceError::NotFound(id))?;
                if !inside {
                    return Err(InstanceError::NotInInstance(player));
                }
                this.evict(tick, id, player, true)?;
                info!(instance_id = %id, player = %player, "kicked player from instance");
                this.summary_or_not_found(id)
            })
            .await?
    }

    /// Handles a player going offline: the access flag is always cleared
    /// and the player leaves any instance they occupied. Returns that
    /// instance.
    ///
    /// An instance the player owns that is still provisioning is marked so
    /// that it is abandoned instead of admitting them once it activates.
    ///
    /// # Errors
    ///
    /// Returns `Authority` if the authoritative thread has stopped.
    pub async fn disconnect(&self, player: PlayerId) -> Result<Option<InstanceId>, InstanceError> {
        let this = self.clone();
        self.ctx
            .authority
            .run(move |tick| {
                this.ctx.gate.revoke(player);
                if let Some(id) = this.occupied_by(player) {
                    return this.evict(tick, id, player, false).map(|_| Some(id));
                }
                if let Some(id) = this.registry.instance_of(player) {
                    if this.registry.update(tick, id, Instance::mark_owner_departed) == Some(true) {
                        info!(instance_id = %id, player = %player, "owner went offline during provisioning");
                    }
                }
                Ok(None)
            })
            .await?
    }

    /// Pushes the expiry of an active instance back by `by`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `NotActive`.
    pub async fn extend(&self, id: InstanceId, by: Duration) -> Result<InstanceSummary, InstanceError> {
        let this = self.clone();
        self.ctx
            .authority
            .run(move |tick| {
                let now = this.ctx.clock.now();
                this.with_active(tick, id, |instance| {
                    let expires_at = instance.extend(to_delta(by));
                    info!(instance_id = %id, %expires_at, "extended instance");
                    instance.summary(now)
                })
            })
            .await?
    }

    /// Clears all condition progress of an active instance.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `NotActive`.
    pub async fn restart(&self, id: InstanceId) -> Result<InstanceSummary, InstanceError> {
        let this = self.clone();
        self.ctx
            .authority
            .run(move |tick| {
                let now = this.ctx.clock.now();
                let engine = Arc::clone(&this.ctx.engine);
                this.with_active(tick, id, |instance| {
                    engine.reset(instance.conditions_mut());
                    info!(instance_id = %id, "restarted instance conditions");
                    instance.summary(now)
                })
            })
            .await?
    }

    /// Per-entry and overall completion progress of an instance.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no visible instance has `id`.
    pub async fn progress(&self, id: InstanceId) -> Result<InstanceProgress, InstanceError> {
        let this = self.clone();
        self.ctx
            .authority
            .run(move |tick| this.progress_on_tick(tick, id))
            .await?
    }

    fn reserve(
        &self,
        tick: &Tick,
        request: &CreateInstance,
        template: &Template,
    ) -> Result<InstanceId, InstanceError> {
        let owner = request.owner;
        if let Some(instance) = self.registry.instance_of(owner) {
            return Err(InstanceError::AlreadyInInstance {
                player: owner,
                instance,
            });
        }
        if let Some(limit) = self
            .ctx
            .settings
            .max_instances
            .filter(|limit| self.registry.len() >= *limit)
        {
            return Err(InstanceError::CapacityReached { limit });
        }
        if let Some(limit) = template
            .max_instances
            .filter(|limit| self.registry.count_template(&template.name) >= *limit)
        {
            return Err(InstanceError::TemplateCapacityReached {
                template: template.name.clone(),
                limit,
            });
        }
        if !self
            .ctx
            .transactions
            .take_requirements(tick, owner, &template.requirements)
        {
            return Err(InstanceError::RequirementsUnmet(owner));
        }

        let id = InstanceId::generate();
        let instance = Instance::provisioning(
            NewInstance {
                id,
                template: template.name.clone(),
                owner,
                display_name: request
                    .display_name
                    .clone()
                    .unwrap_or_else(|| template.display_name.clone()),
                public: request.public,
                created_at: self.ctx.clock.now(),
                lifetime: to_delta(template.timeout),
            },
            self.ctx.engine.instantiate(&template.name),
        );
        self.registry.insert(tick, instance);
        debug!(instance_id = %id, template = %template.name, owner = %owner, "reserved instance");
        Ok(id)
    }

    fn activate(
        &self,
        tick: &Tick,
        id: InstanceId,
        world: WorldHandle,
        template: &Template,
        now_millis: i64,
    ) -> Result<InstanceSummary, InstanceError> {
        let (owner, departed, world_name) = self
            .registry
            .update(tick, id, |instance| {
                let name = world.name().to_owned();
                instance
                    .activate(world)
                    .map(|()| (instance.owner(), instance.owner_departed(), name))
            })
            .ok_or(InstanceError::NotFound(id))??;
        self.ctx.cooldowns.record_creation(owner, now_millis);
        info!(instance_id = %id, template = %template.name, world = %world_name, "instance active");

        if departed {
            info!(instance_id = %id, player = %owner, "owner is gone, abandoning new instance");
            self.abandon_if_empty(tick, id);
        } else if let Err(e) = self.admit(tick, id, owner, template) {
            warn!(instance_id = %id, player = %owner, error = %e, "could not move owner into new instance");
            self.abandon_if_empty(tick, id);
        } else {
            self.evaluate_completion(tick, id);
        }
        self.summary_or_not_found(id)
    }

    fn join_on_tick(
        &self,
        tick: &Tick,
        id: InstanceId,
        player: PlayerId,
    ) -> Result<InstanceSummary, InstanceError> {
        let (state, owner, public, occupants, template) = self
            .registry
            .inspect(id, |instance| {
                (
                    instance.state(),
                    instance.owner(),
                    instance.is_public(),
                    instance.occupant_count(),
                    instance.template().to_owned(),
                )
            })
            .ok_or(InstanceError::NotFound(id))?;
        match state {
            InstanceState::Provisioning => return Err(InstanceError::NotFound(id)),
            InstanceState::Active => {}
            _ => return Err(InstanceError::NotActive { id, state }),
        }
        if let Some(current) = self.registry.instance_of(player) {
            if current == id {
                return self.summary_or_not_found(id);
            }
            return Err(InstanceError::AlreadyInInstance {
                player,
                instance: current,
            });
        }
        if !public && owner != player {
            return Err(InstanceError::Private(id));
        }
        let template = self
            .ctx
            .templates
            .get(&template)
            .ok_or(InstanceError::UnknownTemplate(template))?;
        if template.max_occupants.is_some_and(|max| occupants >= max) {
            return Err(InstanceError::Full(id));
        }

        self.admit(tick, id, player, template)?;
        info!(instance_id = %id, player = %player, "player joined instance");
        self.evaluate_completion(tick, id);
        self.summary_or_not_found(id)
    }

    fn progress_on_tick(&self, tick: &Tick, id: InstanceId) -> Result<InstanceProgress, InstanceError> {
        self.evaluate_completion(tick, id);
        let now = self.ctx.clock.now();
        let engine = &self.ctx.engine;
        let host = self.ctx.host.as_ref();
        self.registry
            .update(tick, id, |instance| {
                let state = instance.state();
                if state == InstanceState::Provisioning {
                    return Err(InstanceError::NotFound(id));
                }
                let summary = instance.summary(now);
                let occupants: Vec<PlayerId> = instance.occupants().collect();
                let world = instance
                    .world()
                    .cloned()
                    .filter(|_| !matches!(state, InstanceState::Deleting | InstanceState::Deleted));
                let (overall, entries) = match world {
                    Some(world) => {
                        let probe = HostProbe {
                            host,
                            tick,
                            world: &world,
                            occupants: &occupants,
                        };
                        let tree = instance.conditions_mut();
                        (engine.progress(tree, &probe), engine.report(tree, &probe))
                    }
                    None => (0.0, Vec::new()),
                };
                Ok(InstanceProgress {
                    summary,
                    overall,
                    entries,
                })
            })
            .ok_or(InstanceError::NotFound(id))?
    }

    /// Grants access, records the occupant and teleports them to the
    /// template spawn. Rolled back if the teleport fails.
    fn admit(
        &self,
        tick: &Tick,
        id: InstanceId,
        player: PlayerId,
        template: &Template,
    ) -> Result<(), InstanceError> {
        let world = self
            .registry
            .inspect(id, |instance| instance.world().cloned())
            .flatten()
            .ok_or(InstanceError::NotFound(id))?;

        self.ctx.gate.grant(player);
        self.registry
            .update(tick, id, |instance| instance.add_occupant(player));
        let destination = WorldLocation {
            world: world.name().to_owned(),
            location: template.spawn,
        };
        if let Err(e) = self.ctx.host.teleport(tick, player, &destination) {
            self.registry
                .update(tick, id, |instance| instance.remove_occupant(player));
            self.ctx.gate.revoke(player);
            return Err(e.into());
        }
        Ok(())
    }

    /// Removes `player` from instance `id` and clears their access flag,
    /// optionally relocating them. An active instance left empty is
    /// abandoned.
    pub(super) fn evict(
        &self,
        tick: &Tick,
        id: InstanceId,
        player: PlayerId,
        relocate: bool,
    ) -> Result<bool, InstanceError> {
        let removed = self
            .registry
            .update(tick, id, |instance| instance.remove_occupant(player))
            .ok_or(InstanceError::NotFound(id))?;
        self.ctx.gate.revoke(player);
        if relocate {
            self.relocate(tick, player);
        }
        if removed {
            debug!(instance_id = %id, player = %player, "player left instance");
            self.abandon_if_empty(tick, id);
        }
        Ok(removed)
    }

    /// Sends `player` to the primary world spawn.
    pub(super) fn relocate(&self, tick: &Tick, player: PlayerId) {
        let spawn = self.ctx.host.primary_spawn();
        if let Err(e) = self.ctx.host.teleport(tick, player, &spawn) {
            debug!(player = %player, error = %e, "could not relocate player");
        }
    }

    /// The instance `player` currently occupies.
    pub(super) fn occupied_by(&self, player: PlayerId) -> Option<InstanceId> {
        self.registry.instance_of(player).filter(|id| {
            self.registry
                .inspect(*id, |instance| instance.has_occupant(player))
                .unwrap_or(false)
        })
    }

    fn abandon_if_empty(&self, tick: &Tick, id: InstanceId) {
        let now = self.ctx.clock.now();
        let grace = to_delta(self.ctx.settings.grace);
        let abandoned = self.registry.update(tick, id, |instance| {
            instance.state() == InstanceState::Active
                && instance.occupant_count() == 0
                && instance.expire(now, grace).is_ok()
        });
        if abandoned == Some(true) {
            info!(instance_id = %id, "empty instance abandoned");
        }
    }

    fn with_active<R>(
        &self,
        tick: &Tick,
        id: InstanceId,
        f: impl FnOnce(&mut Instance) -> R,
    ) -> Result<R, InstanceError> {
        self.registry
            .update(tick, id, |instance| match instance.state() {
                InstanceState::Active => Ok(f(instance)),
                InstanceState::Provisioning => Err(InstanceError::NotFound(id)),
                state => Err(InstanceError::NotActive { id, state }),
            })
            .ok_or(InstanceError::NotFound(id))?
    }

    pub(super) fn summary_or_not_found(&self, id: InstanceId) -> Result<InstanceSummary, InstanceError> {
        self.get(id)
    }
}
