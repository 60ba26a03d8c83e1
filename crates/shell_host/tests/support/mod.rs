#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use agent_provider_mock::{MockBackend, MockToolRuntime, Round, ScriptedAgent};
use shell_host::{HostConfig, HostService, StreamRelay};
use shell_protocol::channel::{notification_channel, NotificationReceiver};
use shell_protocol::{
    ApprovalMode, Command, CommandError, InitializeParams, Notification, Response, SendResult,
    StreamEvent,
};
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub const WAIT: Duration = Duration::from_secs(2);

pub struct Harness {
    pub service: Arc<HostService>,
    pub notifications: NotificationReceiver,
    pub agent: Arc<ScriptedAgent>,
    pub tools: Arc<MockToolRuntime>,
    pub backend: Arc<MockBackend>,
    pub seen: Vec<Notification>,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(agent: ScriptedAgent, tools: MockToolRuntime) -> Self {
        Self::with_config(agent, tools, HostConfig::default())
    }

    pub fn with_config(agent: ScriptedAgent, tools: MockToolRuntime, config: HostConfig) -> Self {
        let agent = Arc::new(agent);
        let tools = Arc::new(tools);
        let backend = Arc::new(MockBackend::shared(agent.clone(), tools.clone()));
        let (tx, notifications) = notification_channel();
        let service = Arc::new(HostService::new(
            backend.clone(),
            config,
            StreamRelay::new(tx),
        ));

        Self {
            service,
            notifications,
            agent,
            tools,
            backend,
            seen: Vec::new(),
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn scripted(rounds: Vec<Round>, tools: MockToolRuntime) -> Self {
        Self::new(ScriptedAgent::new(rounds), tools)
    }

    pub async fn initialize(&self, mode: ApprovalMode) -> String {
        let mut params = InitializeParams::new(self.dir.path());
        params.approval_mode = Some(mode);

        match self.call(Command::Initialize(params)).await {
            Ok(Response::Initialized(result)) => {
                assert!(result.success);
                result.session_id
            }
            other => panic!("unexpected initialize reply: {other:?}"),
        }
    }

    pub async fn call(&self, command: Command) -> Result<Response, CommandError> {
        self.service.handle(command).await
    }

    /// Starts a `send` in the background so the test can interact mid-turn.
    pub fn spawn_send(
        &self,
        message: &str,
        prompt_id: &str,
    ) -> JoinHandle<Result<Response, CommandError>> {
        let service = Arc::clone(&self.service);
        let command = Command::Send {
            message: message.to_string(),
            prompt_id: prompt_id.to_string(),
        };
        tokio::spawn(async move { service.handle(command).await })
    }

    /// Reads notifications until `predicate` matches one, recording all of them.
    pub async fn wait_for(&mut self, predicate: impl Fn(&Notification) -> bool) -> Notification {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            let notification = tokio::time::timeout_at(deadline, self.notifications.recv())
                .await
                .expect("notification before deadline")
                .expect("relay open");
            self.seen.push(notification.clone());
            if predicate(&notification) {
                return notification;
            }
        }
    }

    pub async fn wait_for_confirmation(&mut self, call_id: &str) {
        self.wait_for(|notification| {
            matches!(
                notification,
                Notification::ConfirmationRequest(request) if request.correlation_id == call_id
            )
        })
        .await;
    }

    /// Records every notification already queued.
    pub fn drain(&mut self) {
        while let Ok(notification) = self.notifications.try_recv() {
            self.seen.push(notification);
        }
    }

    pub fn stream_events(&self) -> Vec<StreamEvent> {
        self.seen
            .iter()
            .filter_map(|notification| match notification {
                Notification::StreamEvent(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn event_kinds(&self) -> Vec<&'static str> {
        self.seen
            .iter()
            .filter_map(|notification| match notification {
                Notification::StreamEvent(event) => Some(event.kind()),
                _ => None,
            })
            .collect()
    }
}

pub async fn sent(handle: JoinHandle<Result<Response, CommandError>>) -> SendResult {
    match tokio::time::timeout(WAIT, handle)
        .await
        .expect("send finishes")
        .expect("send task")
    {
        Ok(Response::Sent(result)) => result,
        other => panic!("unexpected send reply: {other:?}"),
    }
}
