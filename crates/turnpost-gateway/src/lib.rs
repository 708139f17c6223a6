//! Turnpost Gateway: the boundary between the narrator model and session
//! state.
//!
//! A [`SecurityContext`] is bound once per inbound invocation from the
//! server-resolved session. The [`ToolGateway`] checks every model-issued
//! tool call against that context and the closed tool schemas in the
//! [`ToolRegistry`] before anything touches storage.

pub mod context;
pub mod gateway;
pub mod handlers;
pub mod narrator;
pub mod registry;
pub mod sanitize;
pub mod schema;

pub use context::{Caller, SecurityContext};
pub use gateway::{ToolCallRecord, ToolGateway};
pub use narrator::{NarrationPhase, Narrator, NarratorOutput, TurnContext};
pub use registry::{ToolHandler, ToolInvocation, ToolRegistry};
pub use schema::{JsonSchema, ToolSchema};
