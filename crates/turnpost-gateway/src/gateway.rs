//! The tool gateway handed to the narrator for one invocation.

use std::sync::{Mutex, PoisonError};

use serde_json::{Value, json};
use tracing::{debug, warn};
use turnpost_core::clock::Clock;
use turnpost_core::error::DomainError;
use turnpost_core::repository::SessionRepository;
use uuid::Uuid;

use crate::context::SecurityContext;
use crate::registry::{ToolInvocation, ToolRegistry};
use crate::sanitize::sanitize;
use crate::schema::ToolSchema;

/// One tool call as it happened: raw arguments and the sanitized outcome.
/// Errors keep only their public message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    /// Tool name as the model sent it.
    pub tool: String,
    /// Arguments as the model sent them, before validation.
    pub arguments: Value,
    /// Sanitized output, or the public message of the error.
    pub outcome: Result<Value, String>,
}

/// Mediates every tool call the narrator makes during one invocation.
///
/// Fails closed: an unbound gateway rejects every call. Authorization and
/// schema validation complete before any storage access.
pub struct ToolGateway<'a> {
    context: Option<SecurityContext>,
    registry: &'a ToolRegistry,
    repo: &'a dyn SessionRepository,
    clock: &'a dyn Clock,
    correlation_id: Uuid,
    records: Mutex<Vec<ToolCallRecord>>,
}

impl std::fmt::Debug for ToolGateway<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolGateway")
            .field("context", &self.context)
            .field("correlation_id", &self.correlation_id)
            .finish_non_exhaustive()
    }
}

impl<'a> ToolGateway<'a> {
    /// A gateway bound to a security context.
    #[must_use]
    pub fn bind(
        context: SecurityContext,
        registry: &'a ToolRegistry,
        repo: &'a dyn SessionRepository,
        clock: &'a dyn Clock,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            context: Some(context),
            registry,
            repo,
            clock,
            correlation_id,
            records: Mutex::new(Vec::new()),
        }
    }

    /// A gateway with no context. Every call is rejected.
    #[must_use]
    pub fn unbound(
        registry: &'a ToolRegistry,
        repo: &'a dyn SessionRepository,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            context: None,
            registry,
            repo,
            clock,
            correlation_id: Uuid::nil(),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Schemas the narrator may call right now.
    #[must_use]
    pub fn tools(&self) -> Vec<&ToolSchema> {
        self.context
            .as_ref()
            .map(|context| self.registry.schemas_for(context.status()))
            .unwrap_or_default()
    }

    /// Executes a tool call.
    ///
    /// # Errors
    ///
    /// - `DomainError::UnauthorizedToolCall` when unbound or not allow-listed
    /// - `DomainError::UnknownTool` for an unregistered name
    /// - `DomainError::ForbiddenParameter` / `DomainError::Validation` from
    ///   schema validation
    /// - any error raised by the handler
    pub async fn call(&self, tool: &str, arguments: Value) -> Result<Value, DomainError> {
        let result = self.execute(tool, &arguments).await;
        if let Err(err) = &result {
            let game_type = self.context.as_ref().map(|c| c.game_type().as_str());
            warn!(tool, game_type, code = err.code(), error = %err, "tool call rejected");
        }
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ToolCallRecord {
                tool: tool.to_owned(),
                arguments,
                outcome: result.as_ref().cloned().map_err(DomainError::public_message),
            });
        result
    }

    /// Executes a tool call and renders any error as `{"error": message}`
    /// with no identifiers, ready to hand back to the model.
    pub async fn call_for_model(&self, tool: &str, arguments: Value) -> Value {
        match self.call(tool, arguments).await {
            Ok(value) => value,
            Err(err) => json!({ "error": err.public_message() }),
        }
    }

    async fn execute(&self, tool: &str, arguments: &Value) -> Result<Value, DomainError> {
        let Some(context) = &self.context else {
            return Err(DomainError::UnauthorizedToolCall {
                tool: tool.to_owned(),
                status: "unbound",
            });
        };
        let registered = self
            .registry
            .get(tool)
            .ok_or_else(|| DomainError::UnknownTool(tool.to_owned()))?;
        if !context.permits(tool) {
            return Err(DomainError::UnauthorizedToolCall {
                tool: tool.to_owned(),
                status: context.status().as_str(),
            });
        }
        let arguments = registered.schema.validate(arguments)?;

        debug!(
            tool,
            game_type = %context.game_type(),
            status = context.status().as_str(),
            "tool call accepted"
        );
        let output = registered
            .handler
            .handle(ToolInvocation {
                session_id: context.session_id(),
                caller: context.caller(),
                arguments,
                repo: self.repo,
                clock: self.clock,
                correlation_id: self.correlation_id,
            })
            .await?;
        Ok(sanitize(output, context.session_id()))
    }

    /// Calls made so far.
    #[must_use]
    pub fn records(&self) -> Vec<ToolCallRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Consumes the gateway, returning its call records.
    #[must_use]
    pub fn into_records(self) -> Vec<ToolCallRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
