//! In-process transport between the UI and the host.
//!
//! Commands travel on one queue, each optionally carrying a reply slot.
//! Notifications travel on a second, ordered queue in the other direction.

use tokio::sync::{mpsc, oneshot};

use crate::{Command, CommandError, Notification, Response};

pub type Reply = oneshot::Sender<Result<Response, CommandError>>;

#[derive(Debug)]
pub struct CommandEnvelope {
    pub command: Command,
    pub reply: Option<Reply>,
}

impl CommandEnvelope {
    /// Delivers `result` to the issuer, if it is still listening.
    pub fn respond(self, result: Result<Response, CommandError>) {
        if let Some(reply) = self.reply {
            let _ = reply.send(result);
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<CommandEnvelope>,
}

impl CommandSender {
    /// Issues `command` and waits for the host's reply.
    pub async fn invoke(&self, command: Command) -> Result<Response, CommandError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CommandEnvelope {
                command,
                reply: Some(reply_tx),
            })
            .map_err(|_| CommandError::disconnected())?;
        reply_rx.await.map_err(|_| CommandError::disconnected())?
    }

    /// Issues `command` without waiting for a reply.
    pub fn post(&self, command: Command) -> Result<(), CommandError> {
        self.tx
            .send(CommandEnvelope {
                command,
                reply: None,
            })
            .map_err(|_| CommandError::disconnected())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<CommandEnvelope>,
}

impl CommandReceiver {
    pub async fn recv(&mut self) -> Option<CommandEnvelope> {
        self.rx.recv().await
    }
}

#[must_use]
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandReceiver { rx })
}

pub type NotificationSender = mpsc::UnboundedSender<Notification>;
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

#[must_use]
pub fn notification_channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::unbounded_channel()
}
