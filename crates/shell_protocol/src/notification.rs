use serde::{Deserialize, Serialize};

use crate::{
    ConfirmationRequest, ExecutionFailure, ExecutionSuccess, StreamEvent, ToolCallSnapshot,
    ToolStatusChange,
};

/// Channel names shared by both processes.
pub mod channels {
    pub const INITIALIZE: &str = "gemini:initialize";
    pub const SEND: &str = "gemini:send";
    pub const ABORT: &str = "gemini:abort";
    pub const APPROVE: &str = "tools:approve";
    pub const REJECT: &str = "tools:reject";
    pub const GET_HISTORY: &str = "gemini:get-history";
    pub const RESET: &str = "gemini:reset";
    pub const GET_SETTINGS: &str = "gemini:get-settings";

    pub const STREAM_EVENT: &str = "gemini:stream-event";
    pub const CONFIRMATION_REQUEST: &str = "tool:confirmation-request";
    pub const CALLS_UPDATED: &str = "tool:calls-updated";
    pub const STATUS_CHANGED: &str = "tool:status-changed";
    pub const EXECUTION_SUCCESS: &str = "tool:execution-success";
    pub const EXECUTION_FAILURE: &str = "tool:execution-failure";
}

/// One-way message pushed from the host to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload")]
pub enum Notification {
    #[serde(rename = "gemini:stream-event")]
    StreamEvent(StreamEvent),
    #[serde(rename = "tool:confirmation-request")]
    ConfirmationRequest(ConfirmationRequest),
    #[serde(rename = "tool:calls-updated")]
    ToolCallsUpdated(Vec<ToolCallSnapshot>),
    #[serde(rename = "tool:status-changed")]
    ToolStatusChanged(ToolStatusChange),
    #[serde(rename = "tool:execution-success")]
    ExecutionSuccess(ExecutionSuccess),
    #[serde(rename = "tool:execution-failure")]
    ExecutionFailure(ExecutionFailure),
}

impl Notification {
    #[must_use]
    pub fn channel(&self) -> &'static str {
        match self {
            Self::StreamEvent(_) => channels::STREAM_EVENT,
            Self::ConfirmationRequest(_) => channels::CONFIRMATION_REQUEST,
            Self::ToolCallsUpdated(_) => channels::CALLS_UPDATED,
            Self::ToolStatusChanged(_) => channels::STATUS_CHANGED,
            Self::ExecutionSuccess(_) => channels::EXECUTION_SUCCESS,
            Self::ExecutionFailure(_) => channels::EXECUTION_FAILURE,
        }
    }
}

impl From<StreamEvent> for Notification {
    fn from(event: StreamEvent) -> Self {
        Self::StreamEvent(event)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::{ToolCallStatus, ToolCallSummary};

    #[test]
    fn notifications_serialize_under_their_channel_name() {
        let notifications = [
            Notification::from(StreamEvent::content("hi")),
            Notification::ConfirmationRequest(ConfirmationRequest {
                correlation_id: "c1".to_string(),
                tool_call: ToolCallSummary {
                    name: "shell".to_string(),
                    args: json!({}),
                },
            }),
            Notification::ToolCallsUpdated(vec![ToolCallSnapshot {
                call_id: "c1".to_string(),
                name: "shell".to_string(),
                args: json!({}),
                status: ToolCallStatus::Executing,
                result: None,
                error: None,
            }]),
            Notification::ToolStatusChanged(ToolStatusChange {
                correlation_id: "c1".to_string(),
                tool_name: "shell".to_string(),
                status: ToolCallStatus::Scheduled,
            }),
            Notification::ExecutionSuccess(ExecutionSuccess {
                correlation_id: "c1".to_string(),
                tool_name: "shell".to_string(),
                result: json!("ok"),
            }),
            Notification::ExecutionFailure(ExecutionFailure {
                correlation_id: "c1".to_string(),
                tool_name: "shell".to_string(),
                error: "exit 1".to_string(),
            }),
        ];

        for notification in notifications {
            let encoded = serde_json::to_value(&notification).expect("serialize");
            assert_eq!(encoded["channel"], notification.channel());
        }
    }

    #[test]
    fn stream_event_notification_nests_the_event_envelope() {
        let encoded = serde_json::to_value(Notification::from(StreamEvent::UserCancelled))
            .expect("serialize");
        assert_eq!(
            encoded,
            json!({
                "channel": "gemini:stream-event",
                "payload": { "type": "user_cancelled" }
            })
        );
    }
}
