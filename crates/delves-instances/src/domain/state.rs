//! Instance lifecycle states.

use std::fmt;

use serde::Serialize;

/// Where an instance is in its lifecycle.
///
/// ```text
/// PROVISIONING -> ACTIVE -> COMPLETED -> DELETING -> DELETED
///                        \-> EXPIRING -/
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    /// The world is being copied and loaded.
    Provisioning,
    /// Players may enter and conditions are evaluated.
    Active,
    /// Every completion condition held.
    Completed,
    /// Timed out or abandoned.
    Expiring,
    /// Decommission requested, possibly retrying.
    Deleting,
    /// World unloaded and removed. Terminal.
    Deleted,
}

impl InstanceState {
    /// Returns `true` if the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use InstanceState::{Active, Completed, Deleted, Deleting, Expiring, Provisioning};
        matches!(
            (self, next),
            (Provisioning, Active)
                | (Active, Completed | Expiring)
                | (Completed | Expiring, Deleting)
                | (Deleting, Deleted)
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "PROVISIONING",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Expiring => "EXPIRING",
            Self::Deleting => "DELETING",
            Self::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
