use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use agent_provider::{
    AgentBackend, AgentConnection, Part, ProviderInitError, SessionParams, ToolKind,
};
use async_trait::async_trait;
use serde_json::json;

use crate::{lock_unpoisoned, MockTool, MockToolRuntime, Round, ScriptedAgent, MOCK_PROVIDER_ID};

enum Mode {
    Shared(AgentConnection),
    Demo,
    Failing(String),
}

/// Backend handing out mock connections.
pub struct MockBackend {
    mode: Mode,
    sessions: Mutex<Vec<SessionParams>>,
}

impl MockBackend {
    /// Every connect returns the same agent and tool runtime.
    #[must_use]
    pub fn shared(agent: Arc<ScriptedAgent>, tools: Arc<MockToolRuntime>) -> Self {
        Self::with_mode(Mode::Shared(AgentConnection {
            client: agent,
            tools,
        }))
    }

    /// Every connect fails with `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_mode(Mode::Failing(message.into()))
    }

    /// Fresh interactive agent per session, with a `list_directory` tool
    /// rooted at the session's target directory.
    #[must_use]
    pub fn demo() -> Self {
        Self::with_mode(Mode::Demo)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Parameters of every connect attempt, oldest first.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionParams> {
        lock_unpoisoned(&self.sessions).clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::demo()
    }
}

#[async_trait]
impl AgentBackend for MockBackend {
    fn provider_id(&self) -> &str {
        MOCK_PROVIDER_ID
    }

    async fn connect(&self, params: SessionParams) -> Result<AgentConnection, ProviderInitError> {
        lock_unpoisoned(&self.sessions).push(params.clone());

        match &self.mode {
            Mode::Shared(connection) => Ok(connection.clone()),
            Mode::Failing(message) => Err(ProviderInitError::new(message.clone())),
            Mode::Demo => {
                if !params.target_dir.is_dir() {
                    return Err(ProviderInitError::new(format!(
                        "Target directory does not exist: {}",
                        params.target_dir.display()
                    )));
                }

                let next_call = AtomicUsize::new(1);
                let agent = ScriptedAgent::with_responder(Vec::new(), move |parts| {
                    demo_round(parts, &next_call)
                })
                .with_model(params.model.clone());
                let tools = MockToolRuntime::new().with_tool(
                    "list_directory",
                    MockTool::list_directory(ToolKind::Other, &params.target_dir),
                );
                Ok(AgentConnection {
                    client: Arc::new(agent),
                    tools: Arc::new(tools),
                })
            }
        }
    }
}

fn demo_round(parts: &[Part], next_call: &AtomicUsize) -> Round {
    let mut round = Round::new();

    for part in parts {
        match part {
            Part::Text { text } if text.to_lowercase().contains("list") => {
                let call_id = format!("call-{}", next_call.fetch_add(1, Ordering::Relaxed));
                return round
                    .content("Let me look at the project.\n")
                    .tool_call(&call_id, "list_directory", json!({ "path": "." }))
                    .finish("STOP");
            }
            Part::Text { text } => {
                round = round.content(format!("You said: {text}\n"));
            }
            Part::FunctionResponse { name, response, .. } => {
                round = round.content(format!("`{name}` returned {response}\n"));
            }
        }
    }

    round.finish("STOP")
}
