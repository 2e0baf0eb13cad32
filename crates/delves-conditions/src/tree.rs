//! Per-instance condition state.
//!
//! A [`ConditionTree`] is an arena of nodes cloned from a template's
//! blueprint. Composite nodes refer to their children by index, leaves carry
//! the mutable progress for exactly one instance.

use std::collections::HashSet;

use delves_core::event::{KillEvent, MoveEvent};
use delves_core::ids::EntityId;
use delves_core::location::Position;
use serde::Serialize;

use crate::blueprint::{Combinator, ConditionBlueprint, LeafKind, TemplateConditions};

/// Read access to the instance world needed by lazy leaves.
pub trait WorldProbe {
    /// Hostile entities currently alive in the instance world.
    fn hostile_entities(&self) -> Vec<EntityId>;

    /// Current positions of the instance occupants.
    fn occupant_positions(&self) -> Vec<Position>;
}

/// A gameplay event routed to one instance.
#[derive(Debug, Clone, Copy)]
pub enum ConditionEvent<'a> {
    /// An entity died in the instance world.
    Kill(&'a KillEvent),
    /// An occupant moved inside the instance world.
    Move(&'a MoveEvent),
}

/// How composite AND progress is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressAggregation {
    /// Arithmetic mean of the children.
    #[default]
    Mean,
    /// Least-progressed child.
    Minimum,
}

#[derive(Debug, Clone)]
enum Leaf {
    KillAll {
        snapshot: Option<HashSet<EntityId>>,
        killed: HashSet<EntityId>,
    },
    KillSpecific {
        name: String,
        satisfied: bool,
    },
    KillCount {
        target: u32,
        count: u32,
    },
    ReachArea {
        point: Position,
        radius: f64,
        reached: bool,
    },
}

impl Leaf {
    fn from_kind(kind: &LeafKind) -> Self {
        match kind {
            LeafKind::KillAll => Self::KillAll {
                snapshot: None,
                killed: HashSet::new(),
            },
            LeafKind::KillSpecific { name } => Self::KillSpecific {
                name: name.clone(),
                satisfied: false,
            },
            LeafKind::KillCount { count } => Self::KillCount {
                target: *count,
                count: 0,
            },
            LeafKind::ReachArea { point, radius } => Self::ReachArea {
                point: *point,
                radius: *radius,
                reached: false,
            },
        }
    }

    fn handle(&mut self, event: ConditionEvent<'_>) {
        match (self, event) {
            (Self::KillAll { killed, .. }, ConditionEvent::Kill(kill)) => {
                killed.insert(kill.entity);
            }
            (Self::KillSpecific { name, satisfied }, ConditionEvent::Kill(kill)) => {
                if !*satisfied && kill.matches_name(name) {
                    *satisfied = true;
                }
            }
            (Self::KillCount { count, .. }, ConditionEvent::Kill(_)) => {
                *count = count.saturating_add(1);
            }
            (
                Self::ReachArea {
                    point,
                    radius,
                    reached,
                },
                ConditionEvent::Move(moved),
            ) => {
                if !*reached && moved.position.within_cube(point, *radius) {
                    *reached = true;
                }
            }
            _ => {}
        }
    }

    /// Pulls whatever lazy state the leaf needs from the world.
    fn observe(&mut self, probe: &dyn WorldProbe) {
        match self {
            Self::KillAll { snapshot, .. } if snapshot.is_none() => {
                *snapshot = Some(probe.hostile_entities().into_iter().collect());
            }
            Self::ReachArea {
                point,
                radius,
                reached,
            } if !*reached => {
                *reached = probe
                    .occupant_positions()
                    .iter()
                    .any(|position| position.within_cube(point, *radius));
            }
            _ => {}
        }
    }

    fn satisfied(&self) -> bool {
        match self {
            Self::KillAll { snapshot, killed } => snapshot
                .as_ref()
                .is_some_and(|alive| alive.iter().all(|entity| killed.contains(entity))),
            Self::KillSpecific { satisfied, .. } => *satisfied,
            Self::KillCount { target, count } => count >= target,
            Self::ReachArea { reached, .. } => *reached,
        }
    }

    fn progress(&self) -> f64 {
        match self {
            Self::KillAll { snapshot, killed } => match snapshot {
                Some(alive) if !alive.is_empty() => {
                    let done = alive.iter().filter(|entity| killed.contains(entity)).count();
                    ratio(done, alive.len())
                }
                Some(_) => 1.0,
                None => 0.0,
            },
            Self::KillSpecific { satisfied, .. } | Self::ReachArea { reached: satisfied, .. } => {
                if *satisfied { 1.0 } else { 0.0 }
            }
            Self::KillCount { target, count } => {
                (f64::from(*count) / f64::from(*target)).min(1.0)
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::KillAll { snapshot, killed } => match snapshot {
                Some(alive) => {
                    let done = alive.iter().filter(|entity| killed.contains(entity)).count();
                    format!("Kill all monsters ({done}/{})", alive.len())
                }
                None => "Kill all monsters".to_owned(),
            },
            Self::KillSpecific { name, .. } => format!("Kill {name}"),
            Self::KillCount { target, count } => {
                format!("Kill {target} monsters ({}/{target})", count.min(target))
            }
            Self::ReachArea { point, .. } => {
                format!("Reach {},{},{}", point.x, point.y, point.z)
            }
        }
    }

    fn reset(&mut self) {
        match self {
            Self::KillAll { snapshot, killed } => {
                *snapshot = None;
                killed.clear();
            }
            Self::KillSpecific { satisfied, .. } => *satisfied = false,
            Self::KillCount { count, .. } => *count = 0,
            Self::ReachArea { reached, .. } => *reached = false,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(done: usize, total: usize) -> f64 {
    done as f64 / total as f64
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(Leaf),
    Composite {
        combinator: Combinator,
        children: Vec<usize>,
    },
}

#[derive(Debug, Clone, Copy)]
struct Root {
    priority: i32,
    node: usize,
}

/// Progress of one top-level entry, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryReport {
    /// Entry priority.
    pub priority: i32,
    /// Human-readable description.
    pub description: String,
    /// Whether the entry is satisfied.
    pub satisfied: bool,
    /// Progress in `[0, 1]`.
    pub progress: f64,
}

/// The mutable condition state of one instance.
#[derive(Debug, Clone)]
pub struct ConditionTree {
    nodes: Vec<Node>,
    roots: Vec<Root>,
    aggregation: ProgressAggregation,
}

impl ConditionTree {
    /// Clones a fresh tree from `conditions`.
    #[must_use]
    pub fn from_blueprint(conditions: &TemplateConditions, aggregation: ProgressAggregation) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            roots: Vec::with_capacity(conditions.entries().len()),
            aggregation,
        };
        for entry in conditions.entries() {
            let node = tree.push(&entry.blueprint);
            tree.roots.push(Root {
                priority: entry.priority,
                node,
            });
        }
        tree
    }

    fn push(&mut self, blueprint: &ConditionBlueprint) -> usize {
        match blueprint {
            ConditionBlueprint::Leaf(kind) => {
                self.nodes.push(Node::Leaf(Leaf::from_kind(kind)));
                self.nodes.len() - 1
            }
            ConditionBlueprint::Composite {
                combinator,
                children,
                ..
            } => {
                let mut ordered: Vec<&ConditionBlueprint> = children.iter().collect();
                ordered.sort_by(|a, b| b.priority().cmp(&a.priority()));
                let child_ids = ordered.into_iter().map(|child| self.push(child)).collect();
                self.nodes.push(Node::Composite {
                    combinator: *combinator,
                    children: child_ids,
                });
                self.nodes.len() - 1
            }
        }
    }

    /// Returns `true` if the tree has no top-level entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of leaf conditions in the tree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf(_)))
            .count()
    }

    /// Delivers one event to every leaf. Leaves ignore kinds that do not
    /// concern them. The caller guarantees each physical event is delivered
    /// once.
    pub fn handle_event(&mut self, event: ConditionEvent<'_>) {
        for node in &mut self.nodes {
            if let Node::Leaf(leaf) = node {
                leaf.handle(event);
            }
        }
    }

    /// Evaluates every entry and returns `true` iff all of them hold. A tree
    /// without entries never completes.
    pub fn check(&mut self, probe: &dyn WorldProbe) -> bool {
        self.observe(probe);
        !self.roots.is_empty() && self.roots.iter().all(|root| self.satisfied(root.node))
    }

    /// Overall progress, aggregating the top-level entries like an AND node.
    pub fn progress(&mut self, probe: &dyn WorldProbe) -> f64 {
        self.observe(probe);
        let values: Vec<f64> = self.roots.iter().map(|root| self.progress_of(root.node)).collect();
        self.aggregate_and(&values)
    }

    /// Per-entry report, highest priority first.
    pub fn report(&mut self, probe: &dyn WorldProbe) -> Vec<EntryReport> {
        self.observe(probe);
        self.roots
            .iter()
            .map(|root| EntryReport {
                priority: root.priority,
                description: self.describe(root.node),
                satisfied: self.satisfied(root.node),
                progress: self.progress_of(root.node),
            })
            .collect()
    }

    /// Clears every leaf back to its initial state.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            if let Node::Leaf(leaf) = node {
                leaf.reset();
            }
        }
    }

    fn observe(&mut self, probe: &dyn WorldProbe) {
        for node in &mut self.nodes {
            if let Node::Leaf(leaf) = node {
                leaf.observe(probe);
            }
        }
    }

    fn satisfied(&self, node: usize) -> bool {
        match &self.nodes[node] {
            Node::Leaf(leaf) => leaf.satisfied(),
            Node::Composite {
                combinator: Combinator::And,
                children,
            } => children.iter().all(|child| self.satisfied(*child)),
            Node::Composite {
                combinator: Combinator::Or,
                children,
            } => children.iter().any(|child| self.satisfied(*child)),
        }
    }

    fn progress_of(&self, node: usize) -> f64 {
        match &self.nodes[node] {
            Node::Leaf(leaf) => leaf.progress(),
            Node::Composite {
                combinator,
                children,
            } => {
                let values: Vec<f64> = children.iter().map(|child| self.progress_of(*child)).collect();
                match combinator {
                    Combinator::And => self.aggregate_and(&values),
                    Combinator::Or => values.into_iter().fold(0.0, f64::max),
                }
            }
        }
    }

    fn aggregate_and(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self.aggregation {
            ProgressAggregation::Mean => {
                #[allow(clippy::cast_precision_loss)]
                let count = values.len() as f64;
                values.iter().sum::<f64>() / count
            }
            ProgressAggregation::Minimum => values.iter().copied().fold(1.0, f64::min),
        }
    }

    fn describe(&self, node: usize) -> String {
        match &self.nodes[node] {
            Node::Leaf(leaf) => leaf.describe(),
            Node::Composite {
                combinator,
                children,
            } => {
                let joiner = match combinator {
                    Combinator::And => " and ",
                    Combinator::Or => " or ",
                };
                let parts: Vec<String> = children.iter().map(|child| self.describe(*child)).collect();
                format!("({})", parts.join(joiner))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use delves_core::ids::PlayerId;
    use uuid::Uuid;

    use super::*;
    use crate::blueprint::ConditionEntry;

    #[derive(Default)]
    struct StubProbe {
        hostiles: Vec<EntityId>,
        occupants: Vec<Position>,
    }

    impl WorldProbe for StubProbe {
        fn hostile_entities(&self) -> Vec<EntityId> {
            self.hostiles.clone()
        }

        fn occupant_positions(&self) -> Vec<Position> {
            self.occupants.clone()
        }
    }

    fn entity() -> EntityId {
        EntityId::from_uuid(Uuid::new_v4())
    }

    fn kill_of(entity: EntityId, entity_type: &str, custom_name: Option<&str>) -> KillEvent {
        KillEvent {
            world: "dungeon_test".to_owned(),
            killer: None,
            entity,
            entity_type: entity_type.to_owned(),
            custom_name: custom_name.map(str::to_owned),
        }
    }

    fn move_to(x: f64, y: f64, z: f64) -> MoveEvent {
        MoveEvent {
            player: PlayerId::from_uuid(Uuid::new_v4()),
            world: "dungeon_test".to_owned(),
            position: Position::new(x, y, z),
        }
    }

    fn leaf(kind: LeafKind) -> ConditionBlueprint {
        ConditionBlueprint::Leaf(kind)
    }

    fn composite(combinator: Combinator, children: Vec<ConditionBlueprint>) -> ConditionBlueprint {
        ConditionBlueprint::Composite {
            combinator,
            priority: 0,
            children,
        }
    }

    fn tree_of(blueprints: Vec<ConditionBlueprint>) -> ConditionTree {
        tree_with(blueprints, ProgressAggregation::Mean)
    }

    fn tree_with(blueprints: Vec<ConditionBlueprint>, aggregation: ProgressAggregation) -> ConditionTree {
        let entries = blueprints
            .into_iter()
            .map(|blueprint| ConditionEntry {
                priority: 0,
                blueprint,
            })
            .collect();
        ConditionTree::from_blueprint(&TemplateConditions::new(entries), aggregation)
    }

    fn reach_area() -> LeafKind {
        LeafKind::ReachArea {
            point: Position::new(10.0, 64.0, 10.0),
            radius: 3.0,
        }
    }

    #[test]
    fn test_kill_all_with_no_hostiles_is_satisfied_immediately() {
        let mut tree = tree_of(vec![leaf(LeafKind::KillAll)]);
        let probe = StubProbe::default();

        assert!(tree.check(&probe));
        assert!((tree.progress(&probe) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_kill_all_requires_every_snapshotted_entity() {
        // Arrange
        let (a, b) = (entity(), entity());
        let probe = StubProbe {
            hostiles: vec![a, b],
            ..StubProbe::default()
        };
        let mut tree = tree_of(vec![leaf(LeafKind::KillAll)]);
        assert!(!tree.check(&probe));

        // Act
        tree.handle_event(ConditionEvent::Kill(&kill_of(a, "zombie", None)));

        // Assert
        assert!(!tree.check(&probe));
        assert!((tree.progress(&probe) - 0.5).abs() < f64::EPSILON);
        tree.handle_event(ConditionEvent::Kill(&kill_of(b, "zombie", None)));
        assert!(tree.check(&probe));
    }

    #[test]
    fn test_kill_all_ignores_entities_spawned_after_snapshot() {
        let a = entity();
        let mut probe = StubProbe {
            hostiles: vec![a],
            ..StubProbe::default()
        };
        let mut tree = tree_of(vec![leaf(LeafKind::KillAll)]);
        assert!(!tree.check(&probe));

        probe.hostiles.push(entity());
        tree.handle_event(ConditionEvent::Kill(&kill_of(a, "zombie", None)));

        assert!(tree.check(&probe));
    }

    #[test]
    fn test_kill_specific_matches_custom_name_and_sticks() {
        let probe = StubProbe::default();
        let mut tree = tree_of(vec![leaf(LeafKind::KillSpecific {
            name: "Bone Lord".to_owned(),
        })]);

        tree.handle_event(ConditionEvent::Kill(&kill_of(entity(), "zombie", None)));
        assert!(!tree.check(&probe));

        tree.handle_event(ConditionEvent::Kill(&kill_of(entity(), "skeleton", Some("Bone Lord"))));
        tree.handle_event(ConditionEvent::Kill(&kill_of(entity(), "zombie", None)));

        assert!(tree.check(&probe));
    }

    #[test]
    fn test_kill_count_reports_progress_then_completes() {
        // Arrange
        let probe = StubProbe::default();
        let mut tree = tree_of(vec![leaf(LeafKind::KillCount { count: 5 })]);

        // Act
        for _ in 0..4 {
            tree.handle_event(ConditionEvent::Kill(&kill_of(entity(), "zombie", None)));
        }

        // Assert
        assert!(!tree.check(&probe));
        assert!((tree.progress(&probe) - 0.8).abs() < 1e-9);

        tree.handle_event(ConditionEvent::Kill(&kill_of(entity(), "zombie", None)));
        assert!(tree.check(&probe));
        assert!((tree.progress(&probe) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_kill_count_progress_caps_at_one() {
        let probe = StubProbe::default();
        let mut tree = tree_of(vec![leaf(LeafKind::KillCount { count: 2 })]);

        for _ in 0..7 {
            tree.handle_event(ConditionEvent::Kill(&kill_of(entity(), "zombie", None)));
        }

        assert!((tree.progress(&probe) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reach_area_sticks_after_leaving_cube() {
        let probe = StubProbe::default();
        let mut tree = tree_of(vec![leaf(reach_area())]);

        tree.handle_event(ConditionEvent::Move(&move_to(13.0, 61.0, 7.0)));
        assert!(tree.check(&probe));

        tree.handle_event(ConditionEvent::Move(&move_to(100.0, 64.0, 100.0)));
        assert!(tree.check(&probe));
    }

    #[test]
    fn test_reach_area_ignores_positions_outside_cube() {
        let probe = StubProbe::default();
        let mut tree = tree_of(vec![leaf(reach_area())]);

        tree.handle_event(ConditionEvent::Move(&move_to(13.5, 64.0, 10.0)));

        assert!(!tree.check(&probe));
    }

    #[test]
    fn test_reach_area_lazily_sees_occupant_already_inside() {
        let probe = StubProbe {
            occupants: vec![Position::new(9.0, 65.0, 11.0)],
            ..StubProbe::default()
        };
        let mut tree = tree_of(vec![leaf(reach_area())]);

        assert!(tree.check(&probe));
    }

    #[test]
    fn test_and_of_empty_kill_all_and_unreached_area_averages_progress() {
        let probe = StubProbe::default();
        let mut tree = tree_of(vec![composite(
            Combinator::And,
            vec![leaf(LeafKind::KillAll), leaf(reach_area())],
        )]);

        assert!(!tree.check(&probe));
        assert!((tree.progress(&probe) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_minimum_aggregation_reports_least_progressed_child() {
        let probe = StubProbe::default();
        let mut tree = tree_with(
            vec![composite(
                Combinator::And,
                vec![leaf(LeafKind::KillAll), leaf(reach_area())],
            )],
            ProgressAggregation::Minimum,
        );

        assert!(!tree.check(&probe));
        assert!(tree.progress(&probe).abs() < f64::EPSILON);
    }

    #[test]
    fn test_or_progress_is_maximum_of_children() {
        let probe = StubProbe::default();
        let mut tree = tree_of(vec![composite(
            Combinator::Or,
            vec![leaf(LeafKind::KillCount { count: 4 }), leaf(reach_area())],
        )]);

        tree.handle_event(ConditionEvent::Kill(&kill_of(entity(), "zombie", None)));

        assert!(!tree.check(&probe));
        assert!((tree.progress(&probe) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_check_is_conjunction_of_nested_entries() {
        // Arrange: AND(OR(KillSpecific, ReachArea), KillCount(2)) plus KillCount(1).
        let probe = StubProbe::default();
        let mut tree = tree_of(vec![
            composite(
                Combinator::And,
                vec![
                    composite(
                        Combinator::Or,
                        vec![
                            leaf(LeafKind::KillSpecific {
                                name: "warden".to_owned(),
                            }),
                            leaf(reach_area()),
                        ],
                    ),
                    leaf(LeafKind::KillCount { count: 2 }),
                ],
            ),
            leaf(LeafKind::KillCount { count: 1 }),
        ]);

        // Act / Assert
        tree.handle_event(ConditionEvent::Kill(&kill_of(entity(), "zombie", None)));
        assert!(!tree.check(&probe), "second entry satisfied, first is not");

        tree.handle_event(ConditionEvent::Kill(&kill_of(entity(), "zombie", None)));
        assert!(!tree.check(&probe), "OR branch still unsatisfied");

        tree.handle_event(ConditionEvent::Move(&move_to(10.0, 64.0, 10.0)));
        assert!(tree.check(&probe));
    }

    #[test]
    fn test_empty_tree_never_completes() {
        let mut tree = tree_of(Vec::new());

        assert!(tree.is_empty());
        assert!(!tree.check(&StubProbe::default()));
    }

    #[test]
    fn test_reset_clears_leaf_state() {
        let probe = StubProbe::default();
        let mut tree = tree_of(vec![
            leaf(LeafKind::KillCount { count: 1 }),
            leaf(reach_area()),
        ]);
        tree.handle_event(ConditionEvent::Kill(&kill_of(entity(), "zombie", None)));
        tree.handle_event(ConditionEvent::Move(&move_to(10.0, 64.0, 10.0)));
        assert!(tree.check(&probe));

        tree.reset();

        assert!(!tree.check(&probe));
        assert!(tree.progress(&probe).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_lists_entries_by_priority() {
        let entries = vec![
            ConditionEntry {
                priority: 1,
                blueprint: leaf(LeafKind::KillCount { count: 3 }),
            },
            ConditionEntry {
                priority: 9,
                blueprint: leaf(LeafKind::KillSpecific {
                    name: "warden".to_owned(),
                }),
            },
        ];
        let mut tree = ConditionTree::from_blueprint(
            &TemplateConditions::new(entries),
            ProgressAggregation::Mean,
        );

        let report = tree.report(&StubProbe::default());

        assert_eq!(report[0].description, "Kill warden");
        assert_eq!(report[1].description, "Kill 3 monsters (0/3)");
        assert_eq!(tree.leaf_count(), 2);
    }
}
