//! Contract between the agent host and the conversational agent library.
//!
//! The host never talks to a model directly. It connects an [`AgentBackend`]
//! once per session, streams turns through the resulting [`AgentClient`] and
//! executes tool calls through the paired [`ToolRuntime`]. Transport details
//! and model payloads stay on the provider side of this boundary.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shell_protocol::{ApprovalMode, StreamEvent, ToolCallRequest};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Error returned while connecting a backend, before any turn starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failure surfaced by an agent event stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// The request observed its cancellation token and stopped.
    #[error("request aborted")]
    Aborted,
    #[error("{0}")]
    Failed(String),
}

impl AgentError {
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Ordered stream of agent events for one request.
pub type EventStream = BoxStream<'static, Result<StreamEvent, AgentError>>;

/// One piece of input sent to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    FunctionResponse {
        call_id: String,
        name: String,
        response: Value,
    },
}

impl Part {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[must_use]
    pub fn function_response(
        call_id: impl Into<String>,
        name: impl Into<String>,
        response: Value,
    ) -> Self {
        Self::FunctionResponse {
            call_id: call_id.into(),
            name: name.into(),
            response,
        }
    }
}

/// Immutable metadata describing a connected agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Parameters for connecting one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub session_id: String,
    pub target_dir: PathBuf,
    pub model: String,
    pub approval_mode: ApprovalMode,
}

/// Conversational agent bound to one session.
#[async_trait]
pub trait AgentClient: Send + Sync + 'static {
    fn profile(&self) -> ProviderProfile;

    /// Starts one request and returns its events in agent order.
    ///
    /// The stream must end promptly once `cancel` fires, either by closing or
    /// by yielding [`AgentError::Aborted`]. `prompt_id` groups the initial
    /// request with every continuation it spawns.
    fn send_message_stream(
        &self,
        parts: Vec<Part>,
        cancel: CancellationToken,
        prompt_id: &str,
    ) -> EventStream;

    /// Conversation history as opaque JSON entries, oldest first.
    fn history(&self) -> Vec<Value>;

    /// Discards the conversation history.
    async fn reset(&self) -> Result<(), AgentError>;
}

/// Coarse classification used to decide whether a tool needs confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Read,
    Edit,
    Execute,
    Other,
}

/// Returns true when a call of `kind` must pause for a human decision.
#[must_use]
pub fn approval_required(kind: ToolKind, mode: ApprovalMode) -> bool {
    match (kind, mode) {
        (ToolKind::Read, _) => false,
        (_, ApprovalMode::Yolo) => false,
        (ToolKind::Edit, ApprovalMode::AutoEdit) => false,
        _ => true,
    }
}

/// Outcome of validating a call before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCheck {
    Ready,
    NeedsConfirmation,
}

/// Host-side tool registry paired with an [`AgentClient`].
#[async_trait]
pub trait ToolRuntime: Send + Sync + 'static {
    /// Returns `None` when no tool named `name` is registered.
    fn tool_kind(&self, name: &str) -> Option<ToolKind>;

    /// Argument validation hook; accepts everything by default.
    fn validate(&self, _request: &ToolCallRequest) -> Result<(), String> {
        Ok(())
    }

    /// Resolves the tool, validates its arguments and decides whether the
    /// call needs confirmation under `mode`.
    fn prepare(&self, request: &ToolCallRequest, mode: ApprovalMode) -> Result<ToolCheck, String> {
        let kind = self
            .tool_kind(&request.name)
            .ok_or_else(|| format!("Tool \"{}\" not found in registry", request.name))?;
        self.validate(request)?;

        if approval_required(kind, mode) {
            Ok(ToolCheck::NeedsConfirmation)
        } else {
            Ok(ToolCheck::Ready)
        }
    }

    /// Runs the tool. Implementations should stop early once `cancel` fires.
    async fn execute(
        &self,
        request: &ToolCallRequest,
        cancel: CancellationToken,
    ) -> Result<Value, String>;
}

/// Client and tool runtime produced by one successful connect.
#[derive(Clone)]
pub struct AgentConnection {
    pub client: Arc<dyn AgentClient>,
    pub tools: Arc<dyn ToolRuntime>,
}

/// Factory for per-session agent connections.
#[async_trait]
pub trait AgentBackend: Send + Sync + 'static {
    fn provider_id(&self) -> &str;

    async fn connect(&self, params: SessionParams) -> Result<AgentConnection, ProviderInitError>;
}
