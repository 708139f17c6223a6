//! Turnpost: session and turn lifecycle.
//!
//! Owns the session aggregate: its lifecycle state machine, the per-turn
//! state machine, player membership, timeout configuration, and the
//! versioned store operations every other crate commits through.

pub mod application;
pub mod domain;
