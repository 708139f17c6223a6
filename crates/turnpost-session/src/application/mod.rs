//! Application layer: versioned store operations and handlers.

pub mod command_handlers;
pub mod query_handlers;
pub mod store;
