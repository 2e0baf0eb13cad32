//! The completion engine.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::blueprint::TemplateConditions;
use crate::tree::{ConditionEvent, ConditionTree, EntryReport, ProgressAggregation, WorldProbe};

/// Holds the immutable blueprint of every template and evaluates the
/// per-instance trees cloned from them.
///
/// The engine itself carries no per-instance state; each instance owns its
/// [`ConditionTree`] and passes it in.
#[derive(Debug, Clone, Default)]
pub struct CompletionEngine {
    blueprints: HashMap<String, Arc<TemplateConditions>>,
    aggregation: ProgressAggregation,
}

impl CompletionEngine {
    /// Creates an engine with no templates.
    #[must_use]
    pub fn new(aggregation: ProgressAggregation) -> Self {
        Self {
            blueprints: HashMap::new(),
            aggregation,
        }
    }

    /// Registers (or replaces) the blueprint of `template`.
    pub fn register_template(&mut self, template: impl Into<String>, conditions: TemplateConditions) {
        self.blueprints.insert(template.into(), Arc::new(conditions));
    }

    /// Returns the blueprint registered for `template`.
    #[must_use]
    pub fn blueprint(&self, template: &str) -> Option<&TemplateConditions> {
        self.blueprints.get(template).map(AsRef::as_ref)
    }

    /// Clones a fresh tree for a new instance of `template`. Templates with
    /// no registered blueprint yield an empty tree, which never completes.
    #[must_use]
    pub fn instantiate(&self, template: &str) -> ConditionTree {
        match self.blueprints.get(template) {
            Some(conditions) => ConditionTree::from_blueprint(conditions, self.aggregation),
            None => {
                debug!(template, "no conditions registered; instance will never complete");
                ConditionTree::from_blueprint(&TemplateConditions::default(), self.aggregation)
            }
        }
    }

    /// Dispatches an event to every leaf of `tree`.
    pub fn handle_event(&self, tree: &mut ConditionTree, event: ConditionEvent<'_>) {
        tree.handle_event(event);
    }

    /// Returns `true` iff every top-level entry of `tree` is satisfied.
    pub fn is_complete(&self, tree: &mut ConditionTree, probe: &dyn WorldProbe) -> bool {
        tree.check(probe)
    }

    /// Overall progress of `tree` in `[0, 1]`.
    pub fn progress(&self, tree: &mut ConditionTree, probe: &dyn WorldProbe) -> f64 {
        tree.progress(probe)
    }

    /// Per-entry progress of `tree`, highest priority first.
    pub fn report(&self, tree: &mut ConditionTree, probe: &dyn WorldProbe) -> Vec<EntryReport> {
        tree.report(probe)
    }

    /// Clears every leaf of `tree` for a retried run.
    pub fn reset(&self, tree: &mut ConditionTree) {
        tree.reset();
    }
}

#[cfg(test)]
mod tests {
    use delves_core::event::KillEvent;
    use delves_core::ids::EntityId;
    use delves_core::location::Position;
    use uuid::Uuid;

    use super::*;
    use crate::blueprint::{ConditionBlueprint, ConditionEntry, LeafKind};

    struct EmptyWorld;

    impl WorldProbe for EmptyWorld {
        fn hostile_entities(&self) -> Vec<EntityId> {
            Vec::new()
        }

        fn occupant_positions(&self) -> Vec<Position> {
            Vec::new()
        }
    }

    fn kill() -> KillEvent {
        KillEvent {
            world: "dungeon_a".to_owned(),
            killer: None,
            entity: EntityId::from_uuid(Uuid::new_v4()),
            entity_type: "zombie".to_owned(),
            custom_name: None,
        }
    }

    fn engine_with_kill_count(count: u32) -> CompletionEngine {
        let mut engine = CompletionEngine::new(ProgressAggregation::Mean);
        engine.register_template(
            "crypt",
            TemplateConditions::new(vec![ConditionEntry {
                priority: 0,
                blueprint: ConditionBlueprint::Leaf(LeafKind::KillCount { count }),
            }]),
        );
        engine
    }

    #[test]
    fn test_instances_of_same_template_do_not_share_progress() {
        // Arrange
        let engine = engine_with_kill_count(1);
        let mut first = engine.instantiate("crypt");
        let mut second = engine.instantiate("crypt");

        // Act
        engine.handle_event(&mut first, ConditionEvent::Kill(&kill()));

        // Assert
        assert!(engine.is_complete(&mut first, &EmptyWorld));
        assert!(!engine.is_complete(&mut second, &EmptyWorld));
    }

    #[test]
    fn test_unknown_template_yields_tree_that_never_completes() {
        let engine = engine_with_kill_count(1);

        let mut tree = engine.instantiate("unknown");

        assert!(tree.is_empty());
        assert!(!engine.is_complete(&mut tree, &EmptyWorld));
    }

    #[test]
    fn test_reset_restarts_progress() {
        let engine = engine_with_kill_count(2);
        let mut tree = engine.instantiate("crypt");
        engine.handle_event(&mut tree, ConditionEvent::Kill(&kill()));
        assert!((engine.progress(&mut tree, &EmptyWorld) - 0.5).abs() < f64::EPSILON);

        engine.reset(&mut tree);

        assert!(engine.progress(&mut tree, &EmptyWorld).abs() < f64::EPSILON);
    }
}
