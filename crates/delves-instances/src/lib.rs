//! Delves Instances — dungeon instance lifecycle.
//!
//! Owns the instance records and their state machine, the registry that
//! holds them, the service that drives creation, membership, completion and
//! teardown, and the reaper that expires and retries in the background.

pub mod application;
pub mod domain;
pub mod error;
pub mod registry;
pub mod settings;
