//! Kind-string → constructor table for condition descriptors.
//!
//! The configuration loader hands over descriptors such as
//! `{ type: kill_count, count: 5 }`. Composites (`and`/`or`) are resolved
//! structurally; every other kind is looked up in the registered table, so
//! new spellings or leaf kinds are added by registering a constructor rather
//! than by editing a dispatch chain.

use std::collections::HashMap;

use delves_core::location::Location;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::blueprint::{Combinator, ConditionBlueprint, ConditionEntry, LeafKind, TemplateConditions};

/// Raw condition description as produced by the configuration loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDescriptor {
    /// Kind string, for example `kill_all` or `and`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display priority.
    #[serde(default)]
    pub priority: i32,
    /// Children of a composite.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ConditionDescriptor>,
    /// Kind-specific parameters.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Builds a leaf from its parameters.
pub type LeafConstructor = fn(&Map<String, Value>) -> Result<LeafKind, BlueprintError>;

/// Errors raised while turning descriptors into blueprints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlueprintError {
    /// No constructor is registered for the kind.
    #[error("unknown condition type: {0}")]
    UnknownKind(String),

    /// A required parameter is absent.
    #[error("condition {kind} is missing parameter {param}")]
    MissingParameter {
        /// Condition kind.
        kind: &'static str,
        /// Parameter name.
        param: &'static str,
    },

    /// A parameter is present but unusable.
    #[error("condition {kind} has invalid {param}: {reason}")]
    InvalidParameter {
        /// Condition kind.
        kind: &'static str,
        /// Parameter name.
        param: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// A composite without children.
    #[error("composite condition {0} has no children")]
    EmptyComposite(String),
}

/// Registry of leaf constructors.
#[derive(Debug, Clone)]
pub struct ConditionFactory {
    leaves: HashMap<String, LeafConstructor>,
}

impl Default for ConditionFactory {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl ConditionFactory {
    /// A factory with no registered leaves.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            leaves: HashMap::new(),
        }
    }

    /// A factory with the four built-in leaf kinds registered.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut factory = Self::empty();
        factory.register("kill_all", build_kill_all);
        factory.register("kill_specific", build_kill_specific);
        factory.register("kill_count", build_kill_count);
        factory.register("reach_area", build_reach_area);
        factory
    }

    /// Registers `constructor` for `kind`, returning any constructor it
    /// replaced. Kinds are matched case-insensitively.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        constructor: LeafConstructor,
    ) -> Option<LeafConstructor> {
        self.leaves
            .insert(kind.into().to_ascii_lowercase(), constructor)
    }

    /// Builds one blueprint node.
    ///
    /// # Errors
    ///
    /// Returns `BlueprintError` for unknown kinds, empty composites or bad
    /// parameters.
    pub fn build(&self, descriptor: &ConditionDescriptor) -> Result<ConditionBlueprint, BlueprintError> {
        let kind = descriptor.kind.to_ascii_lowercase();
        let combinator = match kind.as_str() {
            "and" | "all" => Some(Combinator::And),
            "or" | "any" => Some(Combinator::Or),
            _ => None,
        };

        if let Some(combinator) = combinator {
            if descriptor.children.is_empty() {
                return Err(BlueprintError::EmptyComposite(descriptor.kind.clone()));
            }
            let children = descriptor
                .children
                .iter()
                .map(|child| self.build(child))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ConditionBlueprint::Composite {
                combinator,
                priority: descriptor.priority,
                children,
            });
        }

        let constructor = self
            .leaves
            .get(&kind)
            .ok_or_else(|| BlueprintError::UnknownKind(descriptor.kind.clone()))?;
        constructor(&descriptor.params).map(ConditionBlueprint::Leaf)
    }

    /// Builds the full condition set of a template.
    ///
    /// # Errors
    ///
    /// Returns the first `BlueprintError` encountered.
    pub fn build_template(
        &self,
        descriptors: &[ConditionDescriptor],
    ) -> Result<TemplateConditions, BlueprintError> {
        let entries = descriptors
            .iter()
            .map(|descriptor| {
                Ok(ConditionEntry {
                    priority: descriptor.priority,
                    blueprint: self.build(descriptor)?,
                })
            })
            .collect::<Result<Vec<_>, BlueprintError>>()?;
        Ok(TemplateConditions::new(entries))
    }
}

fn build_kill_all(_params: &Map<String, Value>) -> Result<LeafKind, BlueprintError> {
    Ok(LeafKind::KillAll)
}

fn build_kill_specific(params: &Map<String, Value>) -> Result<LeafKind, BlueprintError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or(BlueprintError::MissingParameter {
            kind: "kill_specific",
            param: "name",
        })?;
    if name.trim().is_empty() {
        return Err(BlueprintError::InvalidParameter {
            kind: "kill_specific",
            param: "name",
            reason: "must not be empty".to_owned(),
        });
    }
    Ok(LeafKind::KillSpecific {
        name: name.trim().to_owned(),
    })
}

fn build_kill_count(params: &Map<String, Value>) -> Result<LeafKind, BlueprintError> {
    let raw = params.get("count").ok_or(BlueprintError::MissingParameter {
        kind: "kill_count",
        param: "count",
    })?;
    let count = raw
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| BlueprintError::InvalidParameter {
            kind: "kill_count",
            param: "count",
            reason: format!("expected a positive integer, found {raw}"),
        })?;
    Ok(LeafKind::KillCount { count })
}

fn build_reach_area(params: &Map<String, Value>) -> Result<LeafKind, BlueprintError> {
    let raw = params
        .get("location")
        .and_then(Value::as_str)
        .ok_or(BlueprintError::MissingParameter {
            kind: "reach_area",
            param: "location",
        })?;
    let location = Location::parse_tolerant(raw).map_err(|e| BlueprintError::InvalidParameter {
        kind: "reach_area",
        param: "location",
        reason: e.to_string(),
    })?;
    let radius = params
        .get("radius")
        .and_then(Value::as_f64)
        .ok_or(BlueprintError::MissingParameter {
            kind: "reach_area",
            param: "radius",
        })?;
    if !radius.is_finite() || radius < 0.0 {
        return Err(BlueprintError::InvalidParameter {
            kind: "reach_area",
            param: "radius",
            reason: format!("expected a non-negative number, found {radius}"),
        });
    }
    Ok(LeafKind::ReachArea {
        point: location.position,
        radius,
    })
}
