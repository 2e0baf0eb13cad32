//! Instance world entry gate.
//!
//! Players may only stand in an instance world after a sanctioned entry
//! (create or join) granted them the legal-access flag. Every attempted
//! world transition is validated against the flag again. Decisions are
//! never cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use delves_core::clock::Clock;
use delves_core::error::SecurityViolation;
use delves_core::event::{TransitionAttempt, TransitionCause};
use delves_core::ids::PlayerId;
use serde::Serialize;
use tracing::warn;

/// Outcome of validating a world transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDecision {
    /// Let the transition proceed.
    Allow,
    /// Cancel the transition and relocate the player.
    Deny(SecurityViolation),
}

impl EntryDecision {
    /// Returns `true` for [`EntryDecision::Allow`].
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Audit entry written for every denied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Offending player.
    pub player: PlayerId,
    /// World the player tried to enter.
    pub target_world: String,
    /// How the player tried to get there.
    pub cause: TransitionCause,
    /// Whether the legal-access flag was present.
    pub had_access: bool,
    /// Whether the administrative override was present.
    pub had_override: bool,
    /// When the attempt was denied.
    pub denied_at: DateTime<Utc>,
}

/// Destination for security audit records.
pub trait AuditSink: Send + Sync {
    /// Persists or forwards one record.
    fn record(&self, record: &AuditRecord);
}

/// Writes audit records to the `delves::audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        warn!(
            target: "delves::audit",
            player = %record.player,
            target_world = %record.target_world,
            cause = ?record.cause,
            had_access = record.had_access,
            had_override = record.had_override,
            "denied entry into instance world"
        );
    }
}

/// Grants, revokes and checks the per-player legal-access flag.
pub struct SecurityGate {
    world_prefix: String,
    records: DashMap<PlayerId, bool>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SecurityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityGate")
            .field("world_prefix", &self.world_prefix)
            .field("records", &self.records.len())
            .finish_non_exhaustive()
    }
}

impl SecurityGate {
    /// Creates a gate guarding every world whose name starts with
    /// `world_prefix`.
    #[must_use]
    pub fn new(
        world_prefix: impl Into<String>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            world_prefix: world_prefix.into(),
            records: DashMap::new(),
            audit,
            clock,
        }
    }

    /// Marks `player` as having entered through a sanctioned path.
    pub fn grant(&self, player: PlayerId) {
        self.records.insert(player, true);
    }

    /// Clears the flag for `player`.
    pub fn revoke(&self, player: PlayerId) {
        self.records.insert(player, false);
    }

    /// Returns the flag for `player`, creating a cleared record on first
    /// lookup.
    #[must_use]
    pub fn has_access(&self, player: PlayerId) -> bool {
        *self.records.entry(player).or_insert(false)
    }

    /// Returns `true` if `world` is an instance world.
    #[must_use]
    pub fn is_instance_world(&self, world: &str) -> bool {
        world.starts_with(&self.world_prefix)
    }

    /// Validates one attempted transition. Denials are audited; the caller
    /// must cancel the transition and relocate the player.
    pub fn validate_entry(&self, attempt: &TransitionAttempt) -> EntryDecision {
        if !self.is_instance_world(&attempt.destination_world) {
            return EntryDecision::Allow;
        }

        if attempt.admin_override || self.has_access(attempt.player) {
            return EntryDecision::Allow;
        }
        self.deny(attempt)
    }

    /// Audits `attempt` and returns the matching denial, whatever the
    /// flag says. Used when entry is refused on grounds the gate cannot
    /// see, such as the destination belonging to another instance.
    pub fn deny(&self, attempt: &TransitionAttempt) -> EntryDecision {
        self.audit.record(&AuditRecord {
            player: attempt.player,
            target_world: attempt.destination_world.clone(),
            cause: attempt.cause,
            had_access: self.has_access(attempt.player),
            had_override: attempt.admin_override,
            denied_at: self.clock.now(),
        });

        let violation = match attempt.cause {
            TransitionCause::Teleport => SecurityViolation::IllegalTeleport {
                player: attempt.player,
                world: attempt.destination_world.clone(),
            },
            TransitionCause::WorldChange => SecurityViolation::IllegalWorldEntry {
                player: attempt.player,
                world: attempt.destination_world.clone(),
            },
        };
        EntryDecision::Deny(violation)
    }
}
