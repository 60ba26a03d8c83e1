use agent_provider::{AgentError, ProviderInitError};
use shell_protocol::{CallId, CommandError, ToolCallStatus};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("No confirmation callback found for tool call: {call_id}")]
    NoPendingConfirmation { call_id: CallId },

    #[error("A confirmation is already pending for tool call: {call_id}")]
    AlreadyPending { call_id: CallId },
}

impl GatewayError {
    pub(crate) fn no_pending(call_id: &str) -> Self {
        Self::NoPendingConfirmation {
            call_id: call_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("tool call {call_id} cannot move from {from} to {to}")]
    InvalidTransition {
        call_id: CallId,
        from: ToolCallStatus,
        to: ToolCallStatus,
    },

    #[error("tool call {call_id} is not tracked")]
    UnknownCall { call_id: CallId },

    #[error("tool call {call_id} is already in flight")]
    DuplicateCall { call_id: CallId },

    #[error(transparent)]
    Confirmation(#[from] GatewayError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("A turn is already active (prompt {active_prompt_id})")]
    TurnActive { active_prompt_id: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Agent client not initialized")]
    NotInitialized,

    #[error("Session {session_id} has been disposed")]
    Disposed { session_id: String },

    #[error("Failed to initialize agent: {0}")]
    Init(#[from] ProviderInitError),

    #[error("Failed to reset agent history: {0}")]
    Reset(#[source] AgentError),

    #[error(transparent)]
    Turn(#[from] TurnError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<SessionError> for CommandError {
    fn from(error: SessionError) -> Self {
        CommandError::new(error.to_string())
    }
}
