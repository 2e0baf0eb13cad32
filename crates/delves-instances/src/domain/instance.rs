//! The instance record and its transitions.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use delves_conditions::tree::ConditionTree;
use delves_core::host::WorldHandle;
use delves_core::ids::{InstanceId, PlayerId};
use serde::Serialize;

use super::state::InstanceState;
use crate::error::TransitionError;
use crate::settings::RetryPolicy;

/// Everything needed to start tracking a new instance.
#[derive(Debug, Clone)]
pub struct NewInstance {
    /// Freshly allocated id.
    pub id: InstanceId,
    /// Template name.
    pub template: String,
    /// Requesting player.
    pub owner: PlayerId,
    /// Display name.
    pub display_name: String,
    /// Whether other players may join.
    pub public: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Lifetime before expiry.
    pub lifetime: TimeDelta,
}

/// Result of a failed decommission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionFailure {
    /// Try again at the given time.
    RetryAt(DateTime<Utc>),
    /// The retry budget is spent.
    Exhausted {
        /// Attempts made.
        attempts: u32,
    },
}

#[derive(Debug, Clone, Copy, Default)]
struct DeletionProgress {
    attempts: u32,
    next_attempt_at: Option<DateTime<Utc>>,
    in_flight: bool,
}

/// One dungeon instance.
///
/// Mutated only through the transition methods below; each checks the
/// lifecycle table before touching any field.
#[derive(Debug)]
pub struct Instance {
    id: InstanceId,
    template: String,
    owner: PlayerId,
    display_name: String,
    public: bool,
    occupants: BTreeSet<PlayerId>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    state: InstanceState,
    world: Option<WorldHandle>,
    conditions: ConditionTree,
    linger_until: Option<DateTime<Utc>>,
    deletion: DeletionProgress,
    owner_departed: bool,
}

/// Read-only view of an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSummary {
    /// Instance id.
    pub id: InstanceId,
    /// Template name.
    pub template: String,
    /// Display name.
    pub display_name: String,
    /// Owning player.
    pub owner: PlayerId,
    /// Whether other players may join.
    pub public: bool,
    /// Lifecycle state.
    pub state: InstanceState,
    /// Backing world, once provisioned.
    pub world: Option<String>,
    /// Players inside, in id order.
    pub occupants: Vec<PlayerId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
    /// Whole seconds until expiry, never negative.
    pub remaining_secs: i64,
}

impl Instance {
    /// Starts tracking an instance in `PROVISIONING`.
    #[must_use]
    pub fn provisioning(new: NewInstance, conditions: ConditionTree) -> Self {
        Self {
            id: new.id,
            template: new.template,
            owner: new.owner,
            display_name: new.display_name,
            public: new.public,
            occupants: BTreeSet::new(),
            created_at: new.created_at,
            expires_at: saturating_add(new.created_at, new.lifetime),
            state: InstanceState::Provisioning,
            world: None,
            conditions,
            linger_until: None,
            deletion: DeletionProgress::default(),
            owner_departed: false,
        }
    }

    /// Instance id.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Template name.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Owning player.
    #[must_use]
    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    /// Whether other players may join.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> InstanceState {
        self.state
    }

    /// Backing world, set once provisioning succeeded.
    #[must_use]
    pub fn world(&self) -> Option<&WorldHandle> {
        self.world.as_ref()
    }

    /// Expiry time.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// When a completed or expiring instance becomes due for deletion.
    #[must_use]
    pub fn linger_until(&self) -> Option<DateTime<Utc>> {
        self.linger_until
    }

    /// Players inside, in id order.
    pub fn occupants(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.occupants.iter().copied()
    }

    /// Number of players inside.
    #[must_use]
    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    /// Returns `true` if `player` is inside.
    #[must_use]
    pub fn has_occupant(&self, player: PlayerId) -> bool {
        self.occupants.contains(&player)
    }

    /// Returns `true` if the owner went offline before the instance became
    /// active.
    #[must_use]
    pub fn owner_departed(&self) -> bool {
        self.owner_departed
    }

    /// Records that the owner went offline while the world was still being
    /// provisioned. Returns `false` once the instance is past `PROVISIONING`.
    pub fn mark_owner_departed(&mut self) -> bool {
        if self.state != InstanceState::Provisioning {
            return false;
        }
        self.owner_departed = true;
        true
    }

    /// Mutable access to the condition state.
    pub fn conditions_mut(&mut self) -> &mut ConditionTree {
        &mut self.conditions
    }

    /// `PROVISIONING -> ACTIVE`, recording the world handle.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless the instance is provisioning.
    pub fn activate(&mut self, world: WorldHandle) -> Result<(), TransitionError> {
        self.transition(InstanceState::Active)?;
        self.world = Some(world);
        Ok(())
    }

    /// `ACTIVE -> COMPLETED`. Returns `false` if the instance had already
    /// completed.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` from any state other than `ACTIVE` or
    /// `COMPLETED`.
    pub fn complete(&mut self, now: DateTime<Utc>, grace: TimeDelta) -> Result<bool, TransitionError> {
        if self.state == InstanceState::Completed {
            return Ok(false);
        }
        self.transition(InstanceState::Completed)?;
        self.linger_until = Some(saturating_add(now, grace));
        Ok(true)
    }

    /// `ACTIVE -> EXPIRING`, on timeout or abandonment.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless the instance is active.
    pub fn expire(&mut self, now: DateTime<Utc>, grace: TimeDelta) -> Result<(), TransitionError> {
        self.transition(InstanceState::Expiring)?;
        self.linger_until = Some(saturating_add(now, grace));
        Ok(())
    }

    /// `COMPLETED | EXPIRING -> DELETING`. The first decommission attempt is
    /// considered in flight from here on.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` from any other state.
    pub fn begin_deletion(&mut self) -> Result<(), TransitionError> {
        self.transition(InstanceState::Deleting)?;
        self.deletion.in_flight = true;
        Ok(())
    }

    /// Claims a retry of a failed decommission if one is due. Returns
    /// `false` when not deleting, when an attempt is already running, or
    /// when the backoff has not elapsed.
    pub fn claim_retry(&mut self, now: DateTime<Utc>) -> bool {
        let due = self.state == InstanceState::Deleting
            && !self.deletion.in_flight
            && self.deletion.next_attempt_at.is_none_or(|at| at <= now);
        if due {
            self.deletion.in_flight = true;
        }
        due
    }

    /// Records a failed decommission attempt and schedules the next one.
    pub fn deletion_failed(&mut self, now: DateTime<Utc>, policy: &RetryPolicy) -> DeletionFailure {
        self.deletion.in_flight = false;
        self.deletion.attempts += 1;
        if self.deletion.attempts >= policy.max_attempts {
            self.deletion.next_attempt_at = None;
            return DeletionFailure::Exhausted {
                attempts: self.deletion.attempts,
            };
        }
        let at = saturating_add(now, policy.delay_after(self.deletion.attempts));
        self.deletion.next_attempt_at = Some(at);
        DeletionFailure::RetryAt(at)
    }

    /// `DELETING -> DELETED`.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` unless the instance is deleting.
    pub fn mark_deleted(&mut self) -> Result<(), TransitionError> {
        self.transition(InstanceState::Deleted)?;
        self.deletion.in_flight = false;
        Ok(())
    }

    /// Returns `true` if the instance is active and past its expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == InstanceState::Active && now >= self.expires_at
    }

    /// Returns `true` if a completed or expiring instance has lingered long
    /// enough to be deleted.
    #[must_use]
    pub fn linger_elapsed(&self, now: DateTime<Utc>) -> bool {
        matches!(self.state, InstanceState::Completed | InstanceState::Expiring)
            && self.linger_until.is_some_and(|until| until <= now)
    }

    /// Pushes the expiry back by `by`, capped at the latest representable
    /// time. Returns the new expiry.
    pub fn extend(&mut self, by: TimeDelta) -> DateTime<Utc> {
        self.expires_at = saturating_add(self.expires_at, by);
        self.expires_at
    }

    /// Adds `player`. Returns `false` if already inside.
    pub fn add_occupant(&mut self, player: PlayerId) -> bool {
        self.occupants.insert(player)
    }

    /// Removes `player`. Returns `false` if not inside.
    pub fn remove_occupant(&mut self, player: PlayerId) -> bool {
        self.occupants.remove(&player)
    }

    /// Removes and returns every occupant.
    pub fn take_occupants(&mut self) -> Vec<PlayerId> {
        std::mem::take(&mut self.occupants).into_iter().collect()
    }

    /// Builds a read-only view as of `now`.
    #[must_use]
    pub fn summary(&self, now: DateTime<Utc>) -> InstanceSummary {
        InstanceSummary {
            id: self.id,
            template: self.template.clone(),
            display_name: self.display_name.clone(),
            owner: self.owner,
            public: self.public,
            state: self.state,
            world: self.world.as_ref().map(|world| world.name().to_owned()),
            occupants: self.occupants().collect(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            remaining_secs: (self.expires_at - now).num_seconds().max(0),
        }
    }

    fn transition(&mut self, next: InstanceState) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

fn saturating_add(at: DateTime<Utc>, by: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
