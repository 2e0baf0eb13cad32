//! Requirement and reward transactions.
//!
//! Economy, points and item handling belong to external collaborators. The
//! core hands them pre-validated lists and only learns whether the whole
//! transaction succeeded. Rolling back a partial failure is the
//! collaborator's job.

use serde::{Deserialize, Serialize};

use crate::authority::Tick;
use crate::ids::PlayerId;

/// One requirement or reward entry, already validated by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Collaborator-specific kind (`money`, `item`, `command`, ...).
    pub kind: String,
    /// Quantity.
    #[serde(default)]
    pub amount: i64,
    /// Kind-specific detail such as an item id or command line.
    #[serde(default)]
    pub detail: Option<String>,
}

/// Bridge to the collaborators that move resources.
pub trait ResourceTransactions: Send + Sync {
    /// Takes every requirement from `player`. Returns `false` if any could
    /// not be taken.
    fn take_requirements(&self, tick: &Tick, player: PlayerId, requirements: &[ResourceSpec])
    -> bool;

    /// Gives back requirements taken for a run that never started.
    fn refund_requirements(
        &self,
        tick: &Tick,
        player: PlayerId,
        requirements: &[ResourceSpec],
    ) -> bool;

    /// Grants completion rewards to `player`.
    fn grant_rewards(&self, tick: &Tick, player: PlayerId, rewards: &[ResourceSpec]) -> bool;
}

/// Transactions that always succeed and move nothing. Used when no economy
/// integration is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransactions;

impl ResourceTransactions for NoTransactions {
    fn take_requirements(&self, _tick: &Tick, _player: PlayerId, _req: &[ResourceSpec]) -> bool {
        true
    }

    fn refund_requirements(&self, _tick: &Tick, _player: PlayerId, _req: &[ResourceSpec]) -> bool {
        true
    }

    fn grant_rewards(&self, _tick: &Tick, _player: PlayerId, _rewards: &[ResourceSpec]) -> bool {
        true
    }
}
