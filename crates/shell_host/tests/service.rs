mod support;

use std::sync::Arc;

use agent_provider_mock::{MockBackend, MockToolRuntime, Round};
use pretty_assertions::assert_eq;
use serde_json::json;
use shell_host::config::DEFAULT_MODEL;
use shell_host::{HostConfig, HostService, SessionLifecycle, StreamRelay};
use shell_protocol::channel::{command_channel, notification_channel};
use shell_protocol::{
    ApprovalMode, Command, InitializeParams, Notification, Response, Settings, StreamEvent,
};
use support::{sent, Harness};

#[tokio::test]
async fn commands_before_initialize_report_missing_session() {
    let h = Harness::scripted(Vec::new(), MockToolRuntime::new());

    assert_eq!(
        h.call(Command::GetHistory).await,
        Ok(Response::History(Vec::new()))
    );
    assert_eq!(
        h.call(Command::GetSettings).await,
        Ok(Response::Settings(None))
    );
    assert_eq!(h.call(Command::Abort).await, Ok(Response::Accepted));

    let reset = h.call(Command::Reset).await.expect_err("reset");
    assert_eq!(reset.message, "Agent client not initialized");

    let send = h
        .call(Command::Send {
            message: "hi".to_string(),
            prompt_id: "p-1".to_string(),
        })
        .await
        .expect_err("send");
    assert_eq!(send.message, "Agent client not initialized");
}

#[tokio::test]
async fn initialize_fills_defaults_and_reports_settings() {
    let h = Harness::scripted(Vec::new(), MockToolRuntime::new());
    let session_id = h.initialize(ApprovalMode::AutoEdit).await;
    assert!(!session_id.is_empty());

    let reply = h.call(Command::GetSettings).await.expect("settings");
    assert_eq!(
        reply,
        Response::Settings(Some(Settings {
            model: DEFAULT_MODEL.to_string(),
            approval_mode: ApprovalMode::AutoEdit,
            target_dir: h.dir.path().to_path_buf(),
        }))
    );

    let connects = h.backend.sessions();
    assert_eq!(connects.len(), 1);
    assert_eq!(connects[0].session_id, session_id);
    assert_eq!(connects[0].model, DEFAULT_MODEL);
}

#[tokio::test]
async fn blank_model_falls_back_to_configured_default() {
    let h = Harness::with_config(
        agent_provider_mock::ScriptedAgent::new(Vec::new()),
        MockToolRuntime::new(),
        HostConfig {
            default_model: "custom-model".to_string(),
            ..HostConfig::default()
        },
    );
    let mut params = InitializeParams::new(h.dir.path());
    params.model = Some("   ".to_string());
    h.call(Command::Initialize(params)).await.expect("initialize");

    let session = h.service.session().expect("session");
    assert_eq!(session.settings().model, "custom-model");
    assert_eq!(session.settings().approval_mode, ApprovalMode::Default);
}

#[tokio::test]
async fn reinitialize_disposes_previous_session_and_revokes_confirmations() {
    let tools = MockToolRuntime::new().with_tool(
        "shell",
        agent_provider_mock::MockTool::returning(agent_provider::ToolKind::Execute, json!("")),
    );
    let mut h = Harness::scripted(
        vec![Round::new().tool_call("c1", "shell", json!({ "command": "ls" }))],
        tools,
    );
    let first_id = h.initialize(ApprovalMode::Default).await;
    let first = h.service.session().expect("first session");

    let send = h.spawn_send("run ls", "p-1");
    h.wait_for_confirmation("c1").await;

    let second_id = h.initialize(ApprovalMode::Default).await;
    assert_ne!(first_id, second_id);
    assert_eq!(first.lifecycle(), SessionLifecycle::Disposed);
    assert!(first.gateway().pending_ids().is_empty());
    assert!(sent(send).await.was_aborted());

    let late = h
        .call(Command::Approve {
            call_id: "c1".to_string(),
        })
        .await
        .expect_err("old capability");
    assert_eq!(
        late.message,
        "No confirmation callback found for tool call: c1"
    );
    assert_eq!(h.tools.execution_count("c1"), 0);

    let stale = first
        .send("again".to_string(), "p-2".to_string())
        .await
        .expect_err("disposed");
    assert_eq!(
        stale.to_string(),
        format!("Session {first_id} has been disposed")
    );
}

#[tokio::test]
async fn reset_clears_history_and_is_idempotent() {
    let h = Harness::scripted(
        vec![Round::new().content("hello back").finish("STOP")],
        MockToolRuntime::new(),
    );
    h.initialize(ApprovalMode::Default).await;
    sent(h.spawn_send("hello", "p-1")).await;

    match h.call(Command::GetHistory).await {
        Ok(Response::History(history)) => assert_eq!(history.len(), 2),
        other => panic!("unexpected history reply: {other:?}"),
    }

    for _ in 0..2 {
        let reply = h.call(Command::Reset).await.expect("reset");
        assert!(matches!(reply, Response::Ack(ack) if ack.success));
    }
    assert_eq!(
        h.call(Command::GetHistory).await,
        Ok(Response::History(Vec::new()))
    );

    let session = h.service.session().expect("session");
    assert!(session.ledger().snapshot().is_empty());
}

#[tokio::test]
async fn reset_allows_prompt_ids_to_run_again() {
    let h = Harness::scripted(
        vec![
            Round::new().content("first").finish("STOP"),
            Round::new().content("second").finish("STOP"),
        ],
        MockToolRuntime::new(),
    );
    h.initialize(ApprovalMode::Default).await;

    sent(h.spawn_send("hello", "p-1")).await;
    h.call(Command::Reset).await.expect("reset");
    sent(h.spawn_send("hello", "p-1")).await;

    assert_eq!(h.agent.requests().len(), 2);
}

#[tokio::test]
async fn failed_initialization_leaves_no_session() {
    let (tx, _notifications) = notification_channel();
    let service = HostService::new(
        Arc::new(MockBackend::failing("missing API key")),
        HostConfig::default(),
        StreamRelay::new(tx),
    );
    let dir = tempfile::tempdir().expect("tempdir");

    let error = service
        .handle(Command::Initialize(InitializeParams::new(dir.path())))
        .await
        .expect_err("init fails");
    assert_eq!(error.message, "Failed to initialize agent: missing API key");
    assert!(service.session().is_none());
    assert_eq!(
        service.handle(Command::GetSettings).await,
        Ok(Response::Settings(None))
    );
}

#[tokio::test]
async fn serve_answers_commands_over_the_channel() {
    let (commands, receiver) = command_channel();
    let (tx, mut notifications) = notification_channel();
    let service = Arc::new(HostService::new(
        Arc::new(MockBackend::demo()),
        HostConfig::default(),
        StreamRelay::new(tx),
    ));
    let server = tokio::spawn(Arc::clone(&service).serve(receiver));
    let dir = tempfile::tempdir().expect("tempdir");

    let reply = commands
        .invoke(Command::Initialize(InitializeParams::new(dir.path())))
        .await
        .expect("initialize");
    assert!(matches!(reply, Response::Initialized(result) if result.success));

    let reply = commands
        .invoke(Command::Send {
            message: "hello".to_string(),
            prompt_id: "p-1".to_string(),
        })
        .await
        .expect("send");
    assert_eq!(reply, Response::Sent(shell_protocol::SendResult::completed()));

    let mut events = Vec::new();
    while let Ok(Notification::StreamEvent(event)) = notifications.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            StreamEvent::content("You said: hello\n"),
            StreamEvent::finished("STOP"),
        ]
    );

    let session = service.session().expect("session");
    drop(commands);
    tokio::time::timeout(support::WAIT, server)
        .await
        .expect("server stops")
        .expect("server task");
    assert_eq!(session.lifecycle(), SessionLifecycle::Disposed);
}
