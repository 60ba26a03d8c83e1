use std::sync::{Arc, Mutex};

use agent_provider::AgentBackend;
use shell_protocol::channel::CommandReceiver;
use shell_protocol::{Ack, Command, CommandError, InitializeResult, Response};

use crate::config::HostConfig;
use crate::error::SessionError;
use crate::lock_unpoisoned;
use crate::relay::StreamRelay;
use crate::session::ShellSession;

/// Command surface of the privileged host.
///
/// Holds at most one session. Each command is answered independently, so an
/// approval or abort is handled while a `send` for the same session is still
/// in flight.
pub struct HostService {
    backend: Arc<dyn AgentBackend>,
    config: HostConfig,
    relay: StreamRelay,
    session: Mutex<Option<Arc<ShellSession>>>,
    initializing: tokio::sync::Mutex<()>,
}

impl HostService {
    #[must_use]
    pub fn new(backend: Arc<dyn AgentBackend>, config: HostConfig, relay: StreamRelay) -> Self {
        Self {
            backend,
            config,
            relay,
            session: Mutex::new(None),
            initializing: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<Arc<ShellSession>> {
        lock_unpoisoned(&self.session).clone()
    }

    /// Answers commands until every sender is gone.
    pub async fn serve(self: Arc<Self>, mut commands: CommandReceiver) {
        tracing::info!("host service started");
        while let Some(envelope) = commands.recv().await {
            let service = Arc::clone(&self);
            tokio::spawn(async move {
                let channel = envelope.command.channel();
                let result = service.handle(envelope.command.clone()).await;
                if let Err(error) = &result {
                    tracing::warn!(channel, %error, "command failed");
                }
                envelope.respond(result);
            });
        }

        if let Some(session) = self.take_session() {
            session.dispose().await;
        }
        tracing::info!("host service stopped");
    }

    pub async fn handle(&self, command: Command) -> Result<Response, CommandError> {
        tracing::debug!(channel = command.channel(), "command received");
        match command {
            Command::Initialize(params) => {
                let _guard = self.initializing.lock().await;
                if let Some(previous) = self.take_session() {
                    previous.dispose().await;
                }

                let session = ShellSession::initialize(
                    self.backend.as_ref(),
                    params,
                    &self.config,
                    self.relay.clone(),
                )
                .await?;
                let session_id = session.id().to_string();
                *lock_unpoisoned(&self.session) = Some(session);

                Ok(Response::Initialized(InitializeResult {
                    success: true,
                    session_id,
                }))
            }
            Command::Send { message, prompt_id } => {
                let session = self.require_session()?;
                Ok(Response::Sent(session.send(message, prompt_id).await?))
            }
            Command::Abort => {
                if let Some(session) = self.session() {
                    session.abort();
                }
                Ok(Response::Accepted)
            }
            Command::Approve { call_id } => {
                self.require_session()?.approve(&call_id)?;
                Ok(Response::Ack(Ack::OK))
            }
            Command::Reject { call_id, reason } => {
                self.require_session()?.reject(&call_id, reason)?;
                Ok(Response::Ack(Ack::OK))
            }
            Command::GetHistory => Ok(Response::History(
                self.session()
                    .map(|session| session.history())
                    .unwrap_or_default(),
            )),
            Command::Reset => {
                self.require_session()?.reset().await?;
                Ok(Response::Ack(Ack::OK))
            }
            Command::GetSettings => Ok(Response::Settings(
                self.session().map(|session| session.settings().clone()),
            )),
        }
    }

    fn require_session(&self) -> Result<Arc<ShellSession>, SessionError> {
        self.session().ok_or(SessionError::NotInitialized)
    }

    fn take_session(&self) -> Option<Arc<ShellSession>> {
        lock_unpoisoned(&self.session).take()
    }
}
