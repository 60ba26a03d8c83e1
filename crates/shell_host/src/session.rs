use std::sync::{Arc, Mutex};

use agent_provider::{AgentBackend, AgentClient, SessionParams};
use serde_json::Value;
use shell_protocol::{ConfirmationOutcome, InitializeParams, SendResult, Settings};
use uuid::Uuid;

use crate::config::HostConfig;
use crate::controller::TurnController;
use crate::error::SessionError;
use crate::gateway::ConfirmationGateway;
use crate::ledger::ToolCallLedger;
use crate::lock_unpoisoned;
use crate::relay::StreamRelay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifecycle {
    Initializing,
    Active,
    Disposed,
}

/// Everything the host holds for one initialized conversation.
///
/// Built by [`ShellSession::initialize`], torn down by
/// [`ShellSession::dispose`]. Every operation on a disposed session fails.
pub struct ShellSession {
    id: String,
    settings: Settings,
    client: Arc<dyn AgentClient>,
    gateway: Arc<ConfirmationGateway>,
    ledger: Arc<ToolCallLedger>,
    controller: TurnController,
    lifecycle: Mutex<SessionLifecycle>,
}

impl ShellSession {
    /// Connects a fresh agent for `params`, filling unset fields from `config`.
    pub async fn initialize(
        backend: &dyn AgentBackend,
        params: InitializeParams,
        config: &HostConfig,
        relay: StreamRelay,
    ) -> Result<Arc<Self>, SessionError> {
        let settings = Settings {
            model: params
                .model
                .filter(|model| !model.trim().is_empty())
                .unwrap_or_else(|| config.default_model.clone()),
            approval_mode: params.approval_mode.unwrap_or_default(),
            target_dir: params.target_dir,
        };
        let id = Uuid::new_v4().to_string();
        tracing::info!(
            session_id = %id,
            provider = backend.provider_id(),
            model = %settings.model,
            approval_mode = %settings.approval_mode,
            target_dir = %settings.target_dir.display(),
            "initializing session"
        );

        let connection = backend
            .connect(SessionParams {
                session_id: id.clone(),
                target_dir: settings.target_dir.clone(),
                model: settings.model.clone(),
                approval_mode: settings.approval_mode,
            })
            .await?;

        let gateway = Arc::new(ConfirmationGateway::new(relay.clone()));
        let ledger = Arc::new(ToolCallLedger::new(
            connection.tools,
            settings.approval_mode,
            Arc::clone(&gateway),
            Arc::new(relay.clone()),
        ));
        let controller = TurnController::new(
            Arc::clone(&connection.client),
            Arc::clone(&ledger),
            relay,
            config.max_tool_rounds,
        );

        let session = Self {
            id,
            settings,
            client: connection.client,
            gateway,
            ledger,
            controller,
            lifecycle: Mutex::new(SessionLifecycle::Initializing),
        };
        session.set_lifecycle(SessionLifecycle::Active);
        Ok(Arc::new(session))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn lifecycle(&self) -> SessionLifecycle {
        *lock_unpoisoned(&self.lifecycle)
    }

    #[must_use]
    pub fn ledger(&self) -> &ToolCallLedger {
        &self.ledger
    }

    #[must_use]
    pub fn gateway(&self) -> &ConfirmationGateway {
        &self.gateway
    }

    pub async fn send(
        &self,
        message: String,
        prompt_id: String,
    ) -> Result<SendResult, SessionError> {
        self.ensure_active()?;
        let outcome = self.controller.start_turn(message, prompt_id).await?;
        Ok(outcome.into())
    }

    pub fn abort(&self) {
        if !self.controller.abort() {
            tracing::debug!(session_id = %self.id, "abort with no active turn");
        }
    }

    pub fn approve(&self, call_id: &str) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.gateway
            .resolve(call_id, ConfirmationOutcome::ProceedOnce)?;
        Ok(())
    }

    pub fn reject(&self, call_id: &str, reason: Option<String>) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.gateway
            .resolve(call_id, ConfirmationOutcome::cancel(reason))?;
        Ok(())
    }

    #[must_use]
    pub fn history(&self) -> Vec<Value> {
        self.client.history()
    }

    /// Aborts any running turn, then clears agent history and the ledger.
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.ensure_active()?;
        self.controller.abort_and_wait().await;
        self.client.reset().await.map_err(SessionError::Reset)?;
        self.ledger.clear();
        self.controller.forget_outcomes();
        tracing::info!(session_id = %self.id, "session reset");
        Ok(())
    }

    /// Ends the session: aborts its turn and revokes pending confirmations.
    ///
    /// Disposing twice is a no-op.
    pub async fn dispose(&self) {
        if self.set_lifecycle(SessionLifecycle::Disposed) == SessionLifecycle::Disposed {
            return;
        }

        self.controller.abort_and_wait().await;
        let revoked = self.gateway.revoke_all();
        tracing::info!(session_id = %self.id, revoked, "session disposed");
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.lifecycle() {
            SessionLifecycle::Active => Ok(()),
            SessionLifecycle::Initializing => Err(SessionError::NotInitialized),
            SessionLifecycle::Disposed => Err(SessionError::Disposed {
                session_id: self.id.clone(),
            }),
        }
    }

    fn set_lifecycle(&self, next: SessionLifecycle) -> SessionLifecycle {
        let mut lifecycle = lock_unpoisoned(&self.lifecycle);
        let previous = *lifecycle;
        *lifecycle = next;
        previous
    }
}
