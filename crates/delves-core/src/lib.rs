//! Delves Core — shared abstractions.
//!
//! This crate defines the identifiers, error taxonomy, host capability
//! traits and the authoritative thread that every other crate builds on.
//! It contains no filesystem or instance logic.

pub mod authority;
pub mod clock;
pub mod error;
pub mod event;
pub mod host;
pub mod ids;
pub mod location;
pub mod transactions;
