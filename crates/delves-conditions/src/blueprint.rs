//! Immutable per-template condition descriptions.

use delves_core::location::Position;
use serde::{Deserialize, Serialize};

/// The leaf condition kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LeafKind {
    /// Kill every hostile entity alive at first evaluation.
    KillAll,
    /// Kill one entity matching `name` by base type or custom name.
    KillSpecific {
        /// Name to match.
        name: String,
    },
    /// Kill `count` entities of any kind.
    KillCount {
        /// Required number of kills.
        count: u32,
    },
    /// Have any occupant stand inside the cube around `point`.
    ReachArea {
        /// Cube center.
        point: Position,
        /// Half edge length of the cube.
        radius: f64,
    },
}

/// Boolean combinator for composite conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Every child must be satisfied.
    And,
    /// At least one child must be satisfied.
    Or,
}

/// A node of a condition blueprint.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionBlueprint {
    /// A leaf condition.
    Leaf(LeafKind),
    /// An AND/OR over ordered children.
    Composite {
        /// How children combine.
        combinator: Combinator,
        /// Display priority among siblings (higher first).
        priority: i32,
        /// Child conditions, in configured order.
        children: Vec<ConditionBlueprint>,
    },
}

impl ConditionBlueprint {
    /// Display priority of this node. Leaves have priority 0.
    #[must_use]
    pub fn priority(&self) -> i32 {
        match self {
            Self::Leaf(_) => 0,
            Self::Composite { priority, .. } => *priority,
        }
    }
}

/// A top-level condition attached to a template.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionEntry {
    /// Display/resolution priority (higher first).
    pub priority: i32,
    /// The condition itself.
    pub blueprint: ConditionBlueprint,
}

/// Every top-level condition of one template, highest priority first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateConditions {
    entries: Vec<ConditionEntry>,
}

impl TemplateConditions {
    /// Builds the set, ordering entries by descending priority. Entries with
    /// equal priority keep their configured order.
    #[must_use]
    pub fn new(mut entries: Vec<ConditionEntry>) -> Self {
        entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { entries }
    }

    /// Entries in descending priority order.
    #[must_use]
    pub fn entries(&self) -> &[ConditionEntry] {
        &self.entries
    }

    /// Returns `true` if the template has no conditions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
