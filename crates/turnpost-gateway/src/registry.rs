//! Tool registry: name to schema, permitted statuses and handler.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::{Map, Value};
use turnpost_core::clock::Clock;
use turnpost_core::error::DomainError;
use turnpost_core::identity::SessionId;
use turnpost_core::repository::SessionRepository;
use turnpost_session::domain::lifecycle::SessionStatus;
use uuid::Uuid;

use crate::context::Caller;
use crate::handlers;
use crate::schema::ToolSchema;

/// Everything a handler gets for one validated call. The session id is the
/// one bound in the security context, never a model-supplied value.
pub struct ToolInvocation<'a> {
    /// Session bound at context creation.
    pub session_id: &'a SessionId,
    /// Who triggered the narration, for audit logging.
    pub caller: &'a Caller,
    /// Arguments after schema validation.
    pub arguments: Map<String, Value>,
    /// Storage the handler reads and commits through.
    pub repo: &'a dyn SessionRepository,
    pub clock: &'a dyn Clock,
    /// Correlation ID of the narration, carried into any events.
    pub correlation_id: Uuid,
}

/// Executes one tool against the storage adapter.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Runs the tool. Mutations must commit through the version-checked
    /// store.
    ///
    /// # Errors
    ///
    /// Returns any `DomainError`; the gateway sanitizes it for the model.
    async fn handle(&self, invocation: ToolInvocation<'_>) -> Result<Value, DomainError>;
}

pub(crate) struct RegisteredTool {
    pub(crate) schema: ToolSchema,
    permitted: Vec<SessionStatus>,
    pub(crate) handler: Box<dyn ToolHandler>,
}

/// Tools available to the narrator, built once at startup and shared.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in session tools.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a built-in schema is not closed.
    pub fn with_builtin_tools() -> Result<Self, DomainError> {
        let mut registry = Self::new();
        for (schema, permitted, handler) in handlers::builtin_tools() {
            registry.register(schema, permitted, handler)?;
        }
        Ok(registry)
    }

    /// Registers a tool.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the schema is open, declares an
    /// internal identifier, or reuses a registered name.
    pub fn register(
        &mut self,
        schema: ToolSchema,
        permitted: &[SessionStatus],
        handler: Box<dyn ToolHandler>,
    ) -> Result<(), DomainError> {
        schema.ensure_closed()?;
        if self.tools.contains_key(&schema.name) {
            return Err(DomainError::Validation(format!(
                "tool {} is already registered",
                schema.name
            )));
        }
        self.tools.insert(
            schema.name.clone(),
            RegisteredTool {
                schema,
                permitted: permitted.to_vec(),
                handler,
            },
        );
        Ok(())
    }

    pub(crate) fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Names of the tools permitted in a status.
    #[must_use]
    pub fn permitted_for(&self, status: SessionStatus) -> BTreeSet<String> {
        self.tools
            .iter()
            .filter(|(_, tool)| tool.permitted.contains(&status))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Schemas of the tools permitted in a status, by name.
    #[must_use]
    pub fn schemas_for(&self, status: SessionStatus) -> Vec<&ToolSchema> {
        self.tools
            .values()
            .filter(|tool| tool.permitted.contains(&status))
            .map(|tool| &tool.schema)
            .collect()
    }

    /// Every registered schema, by name.
    pub fn schemas(&self) -> impl Iterator<Item = &ToolSchema> {
        self.tools.values().map(|tool| &tool.schema)
    }
}
