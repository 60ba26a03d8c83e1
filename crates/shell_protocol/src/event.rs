use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CallId;

/// A side-effecting action the agent asks the host to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    pub call_id: CallId,
    pub name: String,
    #[serde(default)]
    pub args: Value,
    #[serde(
        rename = "prompt_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub prompt_id: Option<String>,
}

impl ToolCallRequest {
    #[must_use]
    pub fn new(call_id: impl Into<CallId>, name: impl Into<String>, args: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            args,
            prompt_id: None,
        }
    }
}

/// Terminal outcome of one tool call as echoed into the turn's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResponse {
    pub call_id: CallId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallResponse {
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedInfo {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub error: String,
}

/// Event emitted while a turn is running.
///
/// Order within one turn is significant and is preserved end to end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StreamEvent {
    Content(String),
    ToolCallRequest(ToolCallRequest),
    ToolCallResponse(ToolCallResponse),
    Finished(FinishedInfo),
    Error(ErrorInfo),
    UserCancelled,
}

impl StreamEvent {
    #[must_use]
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content(text.into())
    }

    #[must_use]
    pub fn finished(reason: impl Into<String>) -> Self {
        Self::Finished(FinishedInfo {
            reason: reason.into(),
        })
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorInfo {
            error: message.into(),
        })
    }

    /// Stable wire name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Content(_) => "content",
            Self::ToolCallRequest(_) => "tool_call_request",
            Self::ToolCallResponse(_) => "tool_call_response",
            Self::Finished(_) => "finished",
            Self::Error(_) => "error",
            Self::UserCancelled => "user_cancelled",
        }
    }

    /// Returns true when this event ends the turn from the UI's point of view.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished(_) | Self::Error(_) | Self::UserCancelled
        )
    }
}
