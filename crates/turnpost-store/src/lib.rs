//! Session stores with optimistic concurrency.
//!
//! Both implementations accept a write only while the stored version equals
//! the version the caller read, and append the session's journal entries in
//! the same write.

pub mod memory;
pub mod pg_session_repository;
pub mod schema;

pub use memory::InMemorySessionRepository;
pub use pg_session_repository::PgSessionRepository;
