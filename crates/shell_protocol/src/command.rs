use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::channels;
use crate::CallId;

/// Policy controlling whether a tool call requires human confirmation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalMode {
    #[default]
    Default,
    AutoEdit,
    Yolo,
}

impl ApprovalMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AutoEdit => "autoEdit",
            Self::Yolo => "yolo",
        }
    }
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub target_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_mode: Option<ApprovalMode>,
}

impl InitializeParams {
    #[must_use]
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            model: None,
            approval_mode: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub success: bool,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SendResult {
    #[must_use]
    pub fn completed() -> Self {
        Self {
            success: true,
            aborted: None,
            error: None,
        }
    }

    #[must_use]
    pub fn aborted() -> Self {
        Self {
            success: true,
            aborted: Some(true),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            aborted: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn was_aborted(&self) -> bool {
        self.aborted.unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub const OK: Self = Self { success: true };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub model: String,
    pub approval_mode: ApprovalMode,
    pub target_dir: PathBuf,
}

/// Request issued by the UI process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload")]
pub enum Command {
    #[serde(rename = "gemini:initialize")]
    Initialize(InitializeParams),
    #[serde(rename = "gemini:send", rename_all = "camelCase")]
    Send { message: String, prompt_id: String },
    #[serde(rename = "gemini:abort")]
    Abort,
    #[serde(rename = "tools:approve", rename_all = "camelCase")]
    Approve { call_id: CallId },
    #[serde(rename = "tools:reject", rename_all = "camelCase")]
    Reject {
        call_id: CallId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(rename = "gemini:get-history")]
    GetHistory,
    #[serde(rename = "gemini:reset")]
    Reset,
    #[serde(rename = "gemini:get-settings")]
    GetSettings,
}

impl Command {
    #[must_use]
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Initialize(_) => channels::INITIALIZE,
            Self::Send { .. } => channels::SEND,
            Self::Abort => channels::ABORT,
            Self::Approve { .. } => channels::APPROVE,
            Self::Reject { .. } => channels::REJECT,
            Self::GetHistory => channels::GET_HISTORY,
            Self::Reset => channels::RESET,
            Self::GetSettings => channels::GET_SETTINGS,
        }
    }

    /// `abort` is fire-and-forget; every other command expects a reply.
    #[must_use]
    pub fn expects_reply(&self) -> bool {
        !matches!(self, Self::Abort)
    }
}

/// Successful reply to a [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Response {
    Initialized(InitializeResult),
    Sent(SendResult),
    Ack(Ack),
    History(Vec<Value>),
    Settings(Option<Settings>),
    Accepted,
}

/// Failure reported back to the issuer of a command.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct CommandError {
    pub message: String,
}

impl CommandError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn disconnected() -> Self {
        Self::new("Host channel disconnected")
    }

    #[must_use]
    pub fn unexpected_response(channel: &str, response: &Response) -> Self {
        Self::new(format!("Unexpected response on {channel}: {response:?}"))
    }
}
