use serde_json::Value;
use shell_protocol::{
    CallId, Command, CommandError, ConfirmationRequest, Notification, Response, StreamEvent,
    ToolCallRequest, ToolCallStatus, ToolCallSummary,
};
use thiserror::Error;
use uuid::Uuid;

/// Commands the store may issue to the privileged host.
pub trait HostOps {
    fn send(&mut self, message: String, prompt_id: String) -> Result<(), CommandError>;
    fn abort(&mut self) -> Result<(), CommandError>;
    fn approve(&mut self, call_id: CallId) -> Result<(), CommandError>;
    fn reject(&mut self, call_id: CallId, reason: Option<String>) -> Result<(), CommandError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Message is empty")]
    EmptyMessage,

    #[error("A turn is already streaming (prompt {prompt_id})")]
    TurnInProgress { prompt_id: String },

    #[error("No decision pending for tool call: {call_id}")]
    NoPendingDecision { call_id: CallId },

    #[error(transparent)]
    Host(#[from] CommandError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// UI mirror of one ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallView {
    pub call_id: CallId,
    pub name: String,
    pub args: Value,
    pub status: ToolCallStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl ToolCallView {
    fn pending(request: ToolCallRequest) -> Self {
        Self {
            call_id: request.call_id,
            name: request.name,
            args: request.args,
            status: ToolCallStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// Applies `next` unless the call already holds a host-reported terminal
    /// status. An optimistic `rejected` only yields to a terminal status.
    fn set_status(&mut self, next: ToolCallStatus) -> bool {
        let accepted = match self.status {
            ToolCallStatus::Rejected => next.is_terminal(),
            current => !current.is_terminal(),
        };
        if accepted {
            self.status = next;
        }
        accepted
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub tool_calls: Vec<ToolCallView>,
}

impl ConversationMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    #[must_use]
    pub fn assistant() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Streaming { prompt_id: String },
    /// The host channel dropped mid-turn; the outcome is unknown.
    Indeterminate { prompt_id: String },
}

impl TurnState {
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    #[must_use]
    pub fn prompt_id(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Streaming { prompt_id } | Self::Indeterminate { prompt_id } => Some(prompt_id),
        }
    }
}

/// A tool call waiting on the user.
#[derive(Debug, Clone, PartialEq)]
pub struct AwaitingDecision {
    pub call_id: CallId,
    pub message_index: usize,
    pub tool_call: ToolCallSummary,
}

/// Local notifications surfaced to whatever renders the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// One agent stream ended. A turn that ran tools spans several streams.
    StreamFinished { reason: String },
    TurnFailed { error: String },
    TurnCancelled,
    Disconnected,
    CommandFailed { channel: &'static str, message: String },
}

/// Conversation replica driven by host notifications and user actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationStore {
    messages: Vec<ConversationMessage>,
    turn: TurnState,
    awaiting: Vec<AwaitingDecision>,
    current_message: Option<usize>,
    notices: Vec<Notice>,
    last_error: Option<String>,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    #[must_use]
    pub fn turn(&self) -> &TurnState {
        &self.turn
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.turn.is_streaming()
    }

    #[must_use]
    pub fn awaiting_decisions(&self) -> &[AwaitingDecision] {
        &self.awaiting
    }

    #[must_use]
    pub fn current_message_index(&self) -> Option<usize> {
        self.current_message
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Newest entry for `call_id` across all messages.
    #[must_use]
    pub fn tool_call(&self, call_id: &str) -> Option<&ToolCallView> {
        self.messages
            .iter()
            .rev()
            .flat_map(|message| message.tool_calls.iter())
            .find(|call| call.call_id == call_id)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Starts a turn for `text` and returns its prompt id.
    pub fn send_message(
        &mut self,
        host: &mut impl HostOps,
        text: &str,
    ) -> Result<String, StoreError> {
        if text.trim().is_empty() {
            return Err(StoreError::EmptyMessage);
        }
        if let TurnState::Streaming { prompt_id } = &self.turn {
            return Err(StoreError::TurnInProgress {
                prompt_id: prompt_id.clone(),
            });
        }

        let prompt_id = Uuid::new_v4().to_string();
        self.messages.push(ConversationMessage::user(text));
        self.messages.push(ConversationMessage::assistant());
        self.current_message = Some(self.messages.len() - 1);
        self.last_error = None;
        self.turn = TurnState::Streaming {
            prompt_id: prompt_id.clone(),
        };

        if let Err(error) = host.send(text.to_string(), prompt_id.clone()) {
            self.end_turn();
            self.last_error = Some(error.message.clone());
            return Err(error.into());
        }
        tracing::debug!(prompt_id = %prompt_id, "turn submitted");
        Ok(prompt_id)
    }

    /// Asks the host to cancel the streaming turn. A no-op when idle.
    pub fn abort(&mut self, host: &mut impl HostOps) -> Result<(), StoreError> {
        if !self.is_streaming() {
            return Ok(());
        }
        host.abort()?;
        Ok(())
    }

    pub fn approve_tool(
        &mut self,
        host: &mut impl HostOps,
        call_id: &str,
    ) -> Result<(), StoreError> {
        self.take_decision(call_id)?;
        if let Some(call) = self.find_call_mut(call_id) {
            call.set_status(ToolCallStatus::Executing);
        }
        host.approve(call_id.to_string())?;
        Ok(())
    }

    pub fn reject_tool(
        &mut self,
        host: &mut impl HostOps,
        call_id: &str,
        reason: Option<String>,
    ) -> Result<(), StoreError> {
        self.take_decision(call_id)?;
        if let Some(call) = self.find_call_mut(call_id) {
            call.set_status(ToolCallStatus::Rejected);
        }
        host.reject(call_id.to_string(), reason)?;
        Ok(())
    }

    /// Approves every awaiting call in arrival order. Returns how many.
    pub fn approve_all(&mut self, host: &mut impl HostOps) -> Result<usize, StoreError> {
        let call_ids = self.awaiting_ids();
        for call_id in &call_ids {
            self.approve_tool(host, call_id)?;
        }
        Ok(call_ids.len())
    }

    pub fn reject_all(
        &mut self,
        host: &mut impl HostOps,
        reason: Option<String>,
    ) -> Result<usize, StoreError> {
        let call_ids = self.awaiting_ids();
        for call_id in &call_ids {
            self.reject_tool(host, call_id, reason.clone())?;
        }
        Ok(call_ids.len())
    }

    /// Drops every message and pending decision. The turn state is kept.
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.awaiting.clear();
        self.current_message = None;
        self.last_error = None;
    }

    pub fn apply(&mut self, notification: Notification) {
        match notification {
            Notification::StreamEvent(event) => self.apply_event(event),
            Notification::ConfirmationRequest(request) => self.await_decision(request),
            Notification::ToolCallsUpdated(snapshot) => {
                for entry in snapshot {
                    if let Some(call) = self.find_call_mut(&entry.call_id) {
                        if call.set_status(entry.status) {
                            call.result = entry.result;
                            call.error = entry.error;
                        }
                    }
                }
                self.forget_settled_decisions();
            }
            Notification::ToolStatusChanged(change) => {
                if let Some(call) = self.find_call_mut(&change.correlation_id) {
                    call.set_status(change.status);
                }
                self.forget_settled_decisions();
            }
            Notification::ExecutionSuccess(success) => {
                if let Some(call) = self.find_call_mut(&success.correlation_id) {
                    if call.set_status(ToolCallStatus::Success) {
                        call.result = Some(success.result);
                    }
                }
            }
            Notification::ExecutionFailure(failure) => {
                if let Some(call) = self.find_call_mut(&failure.correlation_id) {
                    if call.set_status(ToolCallStatus::Error) {
                        call.error = Some(failure.error);
                    }
                }
            }
        }
    }

    /// Reconciles the reply to a command this store issued.
    pub fn on_command_result(
        &mut self,
        command: &Command,
        result: &Result<Response, CommandError>,
    ) {
        match (command, result) {
            (Command::Send { prompt_id, .. }, Ok(Response::Sent(sent))) => {
                if self.turn.prompt_id() != Some(prompt_id.as_str()) {
                    return;
                }
                if let Some(error) = &sent.error {
                    self.last_error.get_or_insert_with(|| error.clone());
                }
                self.end_turn();
            }
            (Command::Send { prompt_id, .. }, Err(error)) => {
                if self.turn.prompt_id() == Some(prompt_id.as_str()) {
                    self.end_turn();
                }
                self.last_error = Some(error.message.clone());
                self.command_failed(command, error);
            }
            (_, Err(error)) => self.command_failed(command, error),
            _ => {}
        }
    }

    /// The host channel is gone; a streaming turn becomes indeterminate.
    pub fn on_disconnected(&mut self) {
        if let TurnState::Streaming { prompt_id } = &self.turn {
            tracing::warn!(prompt_id = %prompt_id, "host disconnected mid-turn");
            self.turn = TurnState::Indeterminate {
                prompt_id: prompt_id.clone(),
            };
        }
        self.awaiting.clear();
        self.notices.push(Notice::Disconnected);
    }

    fn apply_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Content(text) => {
                if self.accepts_stream_output("content") {
                    self.assistant_message_mut().content.push_str(&text);
                }
            }
            StreamEvent::ToolCallRequest(request) => {
                if !self.accepts_stream_output("tool_call_request")
                    || self.tool_call(&request.call_id).is_some()
                {
                    return;
                }
                self.assistant_message_mut()
                    .tool_calls
                    .push(ToolCallView::pending(request));
            }
            StreamEvent::ToolCallResponse(response) => {
                if let Some(call) = self.find_call_mut(&response.call_id) {
                    let status = if response.error.is_some() {
                        ToolCallStatus::Error
                    } else {
                        ToolCallStatus::Success
                    };
                    if call.set_status(status) {
                        call.result = response.result;
                        call.error = response.error;
                    }
                }
            }
            StreamEvent::Finished(info) => {
                self.notices.push(Notice::StreamFinished {
                    reason: info.reason,
                });
            }
            StreamEvent::Error(info) => {
                self.end_turn();
                self.last_error = Some(info.error.clone());
                self.notices.push(Notice::TurnFailed { error: info.error });
            }
            StreamEvent::UserCancelled => {
                self.end_turn();
                self.notices.push(Notice::TurnCancelled);
            }
        }
    }

    /// Output belongs to the open turn until its `send` reply, an `error` or
    /// `user_cancelled` closes it. `finished` only ends one stream.
    fn accepts_stream_output(&self, kind: &str) -> bool {
        let streaming = self.is_streaming();
        if !streaming {
            tracing::debug!(kind, "dropping stream output outside a turn");
        }
        streaming
    }

    fn await_decision(&mut self, request: ConfirmationRequest) {
        if self
            .awaiting
            .iter()
            .any(|decision| decision.call_id == request.correlation_id)
        {
            return;
        }
        let message_index = self
            .current_message
            .unwrap_or_else(|| self.messages.len().saturating_sub(1));
        self.awaiting.push(AwaitingDecision {
            call_id: request.correlation_id,
            message_index,
            tool_call: request.tool_call,
        });
    }

    fn take_decision(&mut self, call_id: &str) -> Result<AwaitingDecision, StoreError> {
        let position = self
            .awaiting
            .iter()
            .position(|decision| decision.call_id == call_id)
            .ok_or_else(|| StoreError::NoPendingDecision {
                call_id: call_id.to_string(),
            })?;
        Ok(self.awaiting.remove(position))
    }

    fn awaiting_ids(&self) -> Vec<CallId> {
        self.awaiting
            .iter()
            .map(|decision| decision.call_id.clone())
            .collect()
    }

    fn forget_settled_decisions(&mut self) {
        let settled: Vec<CallId> = self
            .awaiting
            .iter()
            .filter(|decision| {
                self.tool_call(&decision.call_id)
                    .is_some_and(|call| call.status.is_terminal())
            })
            .map(|decision| decision.call_id.clone())
            .collect();
        self.awaiting
            .retain(|decision| !settled.contains(&decision.call_id));
    }

    fn end_turn(&mut self) {
        self.turn = TurnState::Idle;
        self.awaiting.clear();
        self.current_message = None;
    }

    fn command_failed(&mut self, command: &Command, error: &CommandError) {
        tracing::warn!(channel = command.channel(), %error, "command failed");
        self.notices.push(Notice::CommandFailed {
            channel: command.channel(),
            message: error.message.clone(),
        });
    }

    fn assistant_message_mut(&mut self) -> &mut ConversationMessage {
        let index = match self.current_message {
            Some(index) if self.messages.get(index).is_some_and(|m| m.role == Role::Assistant) => {
                index
            }
            _ => {
                self.messages.push(ConversationMessage::assistant());
                let index = self.messages.len() - 1;
                self.current_message = Some(index);
                index
            }
        };
        &mut self.messages[index]
    }

    fn find_call_mut(&mut self, call_id: &str) -> Option<&mut ToolCallView> {
        self.messages
            .iter_mut()
            .rev()
            .flat_map(|message| message.tool_calls.iter_mut())
            .find(|call| call.call_id == call_id)
    }
}
