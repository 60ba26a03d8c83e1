use std::sync::Arc;
use std::time::Duration;

use agent_provider::ToolKind;
use agent_provider_mock::{MockBackend, MockTool, MockToolRuntime, Round, ScriptedAgent};
use pretty_assertions::assert_eq;
use serde_json::json;
use shell_host::{HostConfig, HostService, StreamRelay};
use shell_protocol::channel::{command_channel, notification_channel};
use shell_protocol::{ApprovalMode, Command, InitializeParams, Response, ToolCallStatus};
use shell_ui::{ConversationStore, Notice, Role, TurnState, UiRuntime};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(2);

struct Shell {
    runtime: UiRuntime,
    agent: Arc<ScriptedAgent>,
    tools: Arc<MockToolRuntime>,
    _dir: TempDir,
}

async fn launch(rounds: Vec<Round>, tools: MockToolRuntime) -> Shell {
    let agent = Arc::new(ScriptedAgent::new(rounds));
    let tools = Arc::new(tools);
    let (commands, command_rx) = command_channel();
    let (notify, notifications) = notification_channel();
    let service = Arc::new(HostService::new(
        Arc::new(MockBackend::shared(agent.clone(), tools.clone())),
        HostConfig::default(),
        StreamRelay::new(notify),
    ));
    tokio::spawn(service.serve(command_rx));

    let dir = tempfile::tempdir().expect("tempdir");
    let mut params = InitializeParams::new(dir.path());
    params.approval_mode = Some(ApprovalMode::Default);
    let reply = commands
        .invoke(Command::Initialize(params))
        .await
        .expect("initialize");
    assert!(matches!(reply, Response::Initialized(result) if result.success));

    Shell {
        runtime: UiRuntime::new(commands, notifications),
        agent,
        tools,
        _dir: dir,
    }
}

impl Shell {
    async fn pump_until(&mut self, done: impl Fn(&ConversationStore) -> bool) {
        while !done(self.runtime.store()) {
            tokio::time::timeout(WAIT, self.runtime.pump_once())
                .await
                .expect("event before deadline")
                .expect("runtime open");
        }
    }

    async fn settle(&mut self) {
        self.pump_until(|store| store.turn() == &TurnState::Idle).await;
    }
}

fn listing_tools() -> MockToolRuntime {
    MockToolRuntime::new().with_tool(
        "list_directory",
        MockTool::returning(ToolKind::Execute, json!(["a.txt", "b.txt"])),
    )
}

#[tokio::test]
async fn approving_a_listing_completes_the_turn() {
    let mut shell = launch(
        vec![
            Round::new()
                .content("Let me look.")
                .tool_call("c1", "list_directory", json!({ "path": "." })),
            Round::new().content(" Found two files.").finish("STOP"),
        ],
        listing_tools(),
    )
    .await;

    shell.runtime.send_message("list files").expect("send");
    shell
        .pump_until(|store| !store.awaiting_decisions().is_empty())
        .await;

    let store = shell.runtime.store();
    assert_eq!(store.awaiting_decisions()[0].call_id, "c1");
    assert_eq!(
        store.tool_call("c1").map(|call| call.status),
        Some(ToolCallStatus::AwaitingApproval)
    );

    shell.runtime.approve("c1").expect("approve");
    shell.settle().await;

    let store = shell.runtime.store();
    assert!(store.awaiting_decisions().is_empty());
    assert_eq!(store.messages().len(), 2);
    assert_eq!(store.messages()[0].role, Role::User);
    assert_eq!(store.messages()[1].content, "Let me look. Found two files.");

    let call = store.tool_call("c1").expect("tracked");
    assert_eq!(call.status, ToolCallStatus::Success);
    assert_eq!(call.result, Some(json!(["a.txt", "b.txt"])));
    assert_eq!(store.messages()[1].tool_calls.len(), 1);
    assert!(shell.runtime.take_notices().contains(&Notice::StreamFinished {
        reason: "STOP".to_string()
    }));
    assert_eq!(shell.agent.requests().len(), 2);
}

#[tokio::test]
async fn rejecting_marks_the_call_cancelled_after_host_confirms() {
    let mut shell = launch(
        vec![
            Round::new().tool_call("c1", "list_directory", json!({ "path": "/" })),
            Round::new().content("Understood.").finish("STOP"),
        ],
        listing_tools(),
    )
    .await;

    shell.runtime.send_message("list root").expect("send");
    shell
        .pump_until(|store| !store.awaiting_decisions().is_empty())
        .await;

    shell
        .runtime
        .reject("c1", Some("not there".to_string()))
        .expect("reject");
    assert_eq!(
        shell.runtime.store().tool_call("c1").map(|call| call.status),
        Some(ToolCallStatus::Rejected)
    );
    shell.settle().await;

    let call = shell.runtime.store().tool_call("c1").expect("tracked");
    assert_eq!(call.status, ToolCallStatus::Cancelled);
    assert_eq!(
        call.error.as_deref(),
        Some("User rejected tool call: not there")
    );
    assert_eq!(shell.tools.execution_count("c1"), 0);
}

#[tokio::test]
async fn abort_mid_stream_keeps_partial_text_only() {
    let mut shell = launch(
        vec![Round::new()
            .content("Working on")
            .wait_for_cancel()
            .content(" it")],
        listing_tools(),
    )
    .await;

    shell.runtime.send_message("do something").expect("send");
    shell
        .pump_until(|store| store.messages()[1].content == "Working on")
        .await;
    shell.runtime.abort().expect("abort");
    shell.settle().await;

    let store = shell.runtime.store();
    assert_eq!(store.messages()[1].content, "Working on");
    assert!(shell.runtime.take_notices().contains(&Notice::TurnCancelled));
}

#[tokio::test]
async fn every_stream_of_a_multi_round_turn_reaches_the_replica() {
    let tools = MockToolRuntime::new()
        .with_tool("read_file", MockTool::returning(ToolKind::Read, json!("ok")));
    let mut shell = launch(
        vec![
            Round::new()
                .content("A")
                .tool_call("c1", "read_file", json!({ "path": "a.txt" }))
                .finish("STOP"),
            Round::new()
                .content(" B")
                .tool_call("c2", "read_file", json!({ "path": "b.txt" }))
                .finish("STOP"),
            Round::new().content(" C").finish("STOP"),
        ],
        tools,
    )
    .await;

    shell.runtime.send_message("read both").expect("send");
    shell.settle().await;

    let store = shell.runtime.store();
    assert_eq!(store.messages().len(), 2);
    assert_eq!(store.messages()[1].content, "A B C");
    let calls: Vec<(&str, ToolCallStatus)> = store.messages()[1]
        .tool_calls
        .iter()
        .map(|call| (call.call_id.as_str(), call.status))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("c1", ToolCallStatus::Success),
            ("c2", ToolCallStatus::Success)
        ]
    );
    let finished = shell
        .runtime
        .take_notices()
        .into_iter()
        .filter(|notice| matches!(notice, Notice::StreamFinished { .. }))
        .count();
    assert_eq!(finished, 3);
    assert_eq!(shell.agent.requests().len(), 3);
}
