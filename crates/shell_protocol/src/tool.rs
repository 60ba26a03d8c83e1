use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CallId;

/// Lifecycle status of one tool call.
///
/// The ledger drives `pending -> validating -> (awaiting_approval | scheduled)
/// -> executing -> (success | error | cancelled)`. `Rejected` is never emitted
/// by the ledger; the UI replica assigns it optimistically when the user
/// declines a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    Validating,
    AwaitingApproval,
    Scheduled,
    Executing,
    Success,
    Error,
    Cancelled,
    Rejected,
}

impl ToolCallStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Success | Self::Error | Self::Cancelled | Self::Rejected
        )
    }

    /// Returns true when the ledger may move a call from `self` to `next`.
    ///
    /// `error` and `cancelled` are reachable from every non-terminal status;
    /// nothing leaves a terminal status.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        use ToolCallStatus::*;

        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            (_, Error | Cancelled) => true,
            (Pending, Validating) => true,
            (Validating, AwaitingApproval | Scheduled) => true,
            (AwaitingApproval, Scheduled) => true,
            (Scheduled, Executing) => true,
            (Executing, Success) => true,
            _ => false,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Validating => "validating",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Scheduled => "scheduled",
            Self::Executing => "executing",
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ToolCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable view of one ledger entry, delivered on `tool:calls-updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallSnapshot {
    pub call_id: CallId,
    pub name: String,
    #[serde(default)]
    pub args: Value,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallSummary {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Host asks the UI for a decision on a paused call.
///
/// Carries only the correlation id, never the resume capability itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    pub correlation_id: CallId,
    pub tool_call: ToolCallSummary,
}

/// Decision applied to a paused call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    ProceedOnce,
    Cancel {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl ConfirmationOutcome {
    #[must_use]
    pub fn cancel(reason: Option<String>) -> Self {
        Self::Cancel { reason }
    }

    #[must_use]
    pub fn is_proceed(&self) -> bool {
        matches!(self, Self::ProceedOnce)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSuccess {
    pub correlation_id: CallId,
    pub tool_name: String,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailure {
    pub correlation_id: CallId,
    pub tool_name: String,
    pub error: String,
}

/// One status transition of a tracked call, delivered on `tool:status-changed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolStatusChange {
    pub correlation_id: CallId,
    pub tool_name: String,
    pub status: ToolCallStatus,
}
