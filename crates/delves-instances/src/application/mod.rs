//! Instance orchestration.

mod context;
mod events;
mod lifecycle;
mod probe;
pub mod reaper;
pub mod service;

pub use context::InstanceContext;
pub use lifecycle::{DeletionOutcome, SweepReport};
pub use service::{CreateInstance, InstanceProgress, InstanceService};
