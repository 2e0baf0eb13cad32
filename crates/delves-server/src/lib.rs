//! Delves server — HTTP surface, configuration and process wiring for the
//! dungeon instance manager.

pub mod catalog;
pub mod config;
pub mod error;
pub mod host;
pub mod routes;
pub mod startup;
pub mod state;
