//! Instance domain types.

pub mod instance;
pub mod state;
pub mod template;
