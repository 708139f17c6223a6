//! Domain layer: state machines, the session aggregate, events and commands.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod lifecycle;
pub mod player;
pub mod timeouts;
pub mod turn;
