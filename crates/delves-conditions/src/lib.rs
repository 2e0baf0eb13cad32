//! Delves Conditions — completion conditions.
//!
//! Templates carry an immutable [`blueprint::TemplateConditions`]. Every
//! provisioned instance receives its own [`tree::ConditionTree`] cloned from
//! that blueprint, so progress made in one instance never leaks into another
//! instance of the same template.

pub mod blueprint;
pub mod engine;
pub mod factory;
pub mod tree;
