use std::time::Duration;

use serde_json::Value;
use shell_protocol::{StreamEvent, ToolCallRequest};

/// One scripted action inside a [`Round`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Emit(StreamEvent),
    /// Pauses the stream; cut short when the request is cancelled.
    Delay(Duration),
    /// Parks the stream until the request is cancelled.
    WaitForCancel,
    /// Ends the stream with a failure.
    Fail(String),
}

/// Scripted response to a single `send_message_stream` request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Round {
    steps: Vec<Step>,
}

impl Round {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Round that only reports a normal stop.
    #[must_use]
    pub fn finished() -> Self {
        Self::new().finish("STOP")
    }

    #[must_use]
    pub fn content(mut self, text: impl Into<String>) -> Self {
        self.steps.push(Step::Emit(StreamEvent::content(text)));
        self
    }

    #[must_use]
    pub fn tool_call(mut self, call_id: &str, name: &str, args: Value) -> Self {
        self.steps
            .push(Step::Emit(StreamEvent::ToolCallRequest(ToolCallRequest::new(
                call_id, name, args,
            ))));
        self
    }

    #[must_use]
    pub fn event(mut self, event: StreamEvent) -> Self {
        self.steps.push(Step::Emit(event));
        self
    }

    #[must_use]
    pub fn finish(mut self, reason: &str) -> Self {
        self.steps.push(Step::Emit(StreamEvent::finished(reason)));
        self
    }

    #[must_use]
    pub fn delay(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Delay(duration));
        self
    }

    #[must_use]
    pub fn wait_for_cancel(mut self) -> Self {
        self.steps.push(Step::WaitForCancel);
        self
    }

    #[must_use]
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push(Step::Fail(message.into()));
        self
    }

    /// Concatenated text of every content step, in order.
    #[must_use]
    pub fn text(&self) -> String {
        self.steps
            .iter()
            .filter_map(|step| match step {
                Step::Emit(StreamEvent::Content(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}
