//! Turnpost Core: shared domain abstractions.
//!
//! This crate defines the fundamental traits and types that every other
//! Turnpost crate depends on: identifiers, the error taxonomy, the clock and
//! RNG seams, the session repository and journal contract, and outbound
//! notifications.
//! It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod event;
pub mod identity;
pub mod notifier;
pub mod repository;
pub mod rng;
