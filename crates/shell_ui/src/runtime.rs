use shell_protocol::channel::{CommandSender, NotificationReceiver};
use shell_protocol::{CallId, Command, CommandError, Notification, Response};
use tokio::sync::mpsc;

use crate::store::{ConversationStore, HostOps, Notice, StoreError};

/// Inbound work for the UI, applied to the store one item at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Notification(Notification),
    CommandResult {
        command: Command,
        result: Result<Response, CommandError>,
    },
    Disconnected,
}

/// [`HostOps`] over the command channel.
///
/// Each command is issued from its own task so the UI never blocks on a
/// reply; replies come back through the runtime inbox. Must be used from
/// within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct CommandBridge {
    commands: CommandSender,
    results: mpsc::UnboundedSender<UiEvent>,
}

impl CommandBridge {
    fn dispatch(&self, command: Command) -> Result<(), CommandError> {
        if self.commands.is_closed() {
            return Err(CommandError::disconnected());
        }

        let commands = self.commands.clone();
        let results = self.results.clone();
        tokio::spawn(async move {
            let result = commands.invoke(command.clone()).await;
            let _ = results.send(UiEvent::CommandResult { command, result });
        });
        Ok(())
    }
}

impl HostOps for CommandBridge {
    fn send(&mut self, message: String, prompt_id: String) -> Result<(), CommandError> {
        self.dispatch(Command::Send { message, prompt_id })
    }

    fn abort(&mut self) -> Result<(), CommandError> {
        self.commands.post(Command::Abort)
    }

    fn approve(&mut self, call_id: CallId) -> Result<(), CommandError> {
        self.dispatch(Command::Approve { call_id })
    }

    fn reject(&mut self, call_id: CallId, reason: Option<String>) -> Result<(), CommandError> {
        self.dispatch(Command::Reject { call_id, reason })
    }
}

enum Inbound {
    Notification(Option<Notification>),
    Result(Option<UiEvent>),
}

/// Owns the conversation store and serializes everything that mutates it.
pub struct UiRuntime {
    store: ConversationStore,
    bridge: CommandBridge,
    commands: CommandSender,
    notifications: Option<NotificationReceiver>,
    results: mpsc::UnboundedReceiver<UiEvent>,
}

impl UiRuntime {
    #[must_use]
    pub fn new(commands: CommandSender, notifications: NotificationReceiver) -> Self {
        let (results_tx, results) = mpsc::unbounded_channel();
        Self {
            store: ConversationStore::new(),
            bridge: CommandBridge {
                commands: commands.clone(),
                results: results_tx,
            },
            commands,
            notifications: Some(notifications),
            results,
        }
    }

    #[must_use]
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Channel for commands outside the store's remit (initialize, reset, ...).
    #[must_use]
    pub fn commands(&self) -> &CommandSender {
        &self.commands
    }

    /// Waits for the next inbound item without applying it.
    ///
    /// Queued notifications win over command replies, so a `send` reply is
    /// never seen before the stream events emitted ahead of it.
    pub async fn next_event(&mut self) -> Option<UiEvent> {
        let Some(notifications) = self.notifications.as_mut() else {
            return self.results.recv().await;
        };

        let inbound = tokio::select! {
            biased;
            notification = notifications.recv() => Inbound::Notification(notification),
            result = self.results.recv() => Inbound::Result(result),
        };

        match inbound {
            Inbound::Notification(Some(notification)) => Some(UiEvent::Notification(notification)),
            Inbound::Notification(None) => {
                self.notifications = None;
                Some(UiEvent::Disconnected)
            }
            Inbound::Result(result) => result,
        }
    }

    /// Applies the next inbound item to the store and returns it.
    pub async fn pump_once(&mut self) -> Option<UiEvent> {
        let event = self.next_event().await?;
        self.apply(&event);
        Some(event)
    }

    pub fn apply(&mut self, event: &UiEvent) {
        match event {
            UiEvent::Notification(notification) => self.store.apply(notification.clone()),
            UiEvent::CommandResult { command, result } => {
                self.store.on_command_result(command, result);
            }
            UiEvent::Disconnected => self.store.on_disconnected(),
        }
    }

    pub fn send_message(&mut self, text: &str) -> Result<String, StoreError> {
        self.store.send_message(&mut self.bridge, text)
    }

    pub fn abort(&mut self) -> Result<(), StoreError> {
        self.store.abort(&mut self.bridge)
    }

    pub fn approve(&mut self, call_id: &str) -> Result<(), StoreError> {
        self.store.approve_tool(&mut self.bridge, call_id)
    }

    pub fn reject(&mut self, call_id: &str, reason: Option<String>) -> Result<(), StoreError> {
        self.store.reject_tool(&mut self.bridge, call_id, reason)
    }

    pub fn approve_all(&mut self) -> Result<usize, StoreError> {
        self.store.approve_all(&mut self.bridge)
    }

    pub fn reject_all(&mut self, reason: Option<String>) -> Result<usize, StoreError> {
        self.store.reject_all(&mut self.bridge, reason)
    }

    pub fn clear_messages(&mut self) {
        self.store.clear_messages();
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.store.take_notices()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use shell_protocol::channel::{command_channel, notification_channel};
    use shell_protocol::{Ack, StreamEvent};

    use super::*;
    use crate::store::TurnState;

    #[tokio::test]
    async fn queued_notifications_are_applied_before_replies() {
        let (commands, mut host) = command_channel();
        let (notify, notifications) = notification_channel();
        let mut runtime = UiRuntime::new(commands, notifications);

        let prompt_id = runtime.send_message("hello").expect("send");
        let envelope = host.recv().await.expect("send command");
        notify
            .send(Notification::from(StreamEvent::content("hi")))
            .expect("notify");
        envelope.respond(Ok(Response::Sent(shell_protocol::SendResult::completed())));
        tokio::task::yield_now().await;

        let first = runtime.pump_once().await.expect("event");
        assert_eq!(
            first,
            UiEvent::Notification(Notification::from(StreamEvent::content("hi")))
        );
        assert_eq!(
            runtime.store().turn(),
            &TurnState::Streaming {
                prompt_id: prompt_id.clone()
            }
        );

        let second = runtime.pump_once().await.expect("reply");
        assert!(matches!(second, UiEvent::CommandResult { .. }));
        assert_eq!(runtime.store().turn(), &TurnState::Idle);
        assert_eq!(runtime.store().messages()[1].content, "hi");
    }

    #[tokio::test]
    async fn dropped_notification_channel_is_reported_once() {
        let (commands, _host) = command_channel();
        let (notify, notifications) = notification_channel();
        let mut runtime = UiRuntime::new(commands, notifications);
        runtime.send_message("hello").expect("send");
        drop(notify);

        assert_eq!(runtime.pump_once().await, Some(UiEvent::Disconnected));
        assert!(matches!(
            runtime.store().turn(),
            TurnState::Indeterminate { .. }
        ));
        assert_eq!(runtime.take_notices(), vec![Notice::Disconnected]);
    }

    #[tokio::test]
    async fn approvals_travel_as_commands() {
        let (commands, mut host) = command_channel();
        let (_notify, notifications) = notification_channel();
        let mut runtime = UiRuntime::new(commands, notifications);

        runtime.apply(&UiEvent::Notification(Notification::ConfirmationRequest(
            shell_protocol::ConfirmationRequest {
                correlation_id: "c1".to_string(),
                tool_call: shell_protocol::ToolCallSummary {
                    name: "shell".to_string(),
                    args: serde_json::json!({}),
                },
            },
        )));
        runtime.approve("c1").expect("approve");

        let envelope = host.recv().await.expect("approve command");
        assert_eq!(
            envelope.command,
            Command::Approve {
                call_id: "c1".to_string()
            }
        );
        envelope.respond(Ok(Response::Ack(Ack::OK)));
        assert!(matches!(
            runtime.pump_once().await,
            Some(UiEvent::CommandResult {
                result: Ok(Response::Ack(_)),
                ..
            })
        ));
    }
}
