//! Delves Access — who may enter instance worlds, and how often players may
//! create them.

pub mod cooldown;
pub mod security;
pub mod snapshot;
