use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_provider::{ToolKind, ToolRuntime};
use async_trait::async_trait;
use serde_json::Value;
use shell_protocol::ToolCallRequest;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::lock_unpoisoned;

/// What a mock tool does when executed.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolBehavior {
    Fixed(Result<Value, String>),
    /// Lists entry names of `args.path`, resolved against `root`.
    ListDirectory { root: PathBuf },
}

#[derive(Debug, Clone)]
pub struct MockTool {
    kind: ToolKind,
    behavior: ToolBehavior,
    delay: Duration,
    gate: Option<Arc<Notify>>,
}

impl MockTool {
    #[must_use]
    pub fn returning(kind: ToolKind, result: Value) -> Self {
        Self::new(kind, ToolBehavior::Fixed(Ok(result)))
    }

    #[must_use]
    pub fn failing(kind: ToolKind, error: impl Into<String>) -> Self {
        Self::new(kind, ToolBehavior::Fixed(Err(error.into())))
    }

    #[must_use]
    pub fn list_directory(kind: ToolKind, root: impl Into<PathBuf>) -> Self {
        Self::new(kind, ToolBehavior::ListDirectory { root: root.into() })
    }

    fn new(kind: ToolKind, behavior: ToolBehavior) -> Self {
        Self {
            kind,
            behavior,
            delay: Duration::ZERO,
            gate: None,
        }
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Holds every execution until `gate` is notified.
    #[must_use]
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

/// Tool registry with canned behaviour and an execution log.
#[derive(Debug, Default)]
pub struct MockToolRuntime {
    tools: HashMap<String, MockTool>,
    executions: Mutex<Vec<String>>,
}

impl MockToolRuntime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tool(mut self, name: impl Into<String>, tool: MockTool) -> Self {
        self.tools.insert(name.into(), tool);
        self
    }

    /// Call ids in the order their execution started.
    #[must_use]
    pub fn executions(&self) -> Vec<String> {
        lock_unpoisoned(&self.executions).clone()
    }

    #[must_use]
    pub fn execution_count(&self, call_id: &str) -> usize {
        lock_unpoisoned(&self.executions)
            .iter()
            .filter(|id| id.as_str() == call_id)
            .count()
    }
}

#[async_trait]
impl ToolRuntime for MockToolRuntime {
    fn tool_kind(&self, name: &str) -> Option<ToolKind> {
        self.tools.get(name).map(|tool| tool.kind)
    }

    async fn execute(
        &self,
        request: &ToolCallRequest,
        cancel: CancellationToken,
    ) -> Result<Value, String> {
        let tool = self
            .tools
            .get(&request.name)
            .ok_or_else(|| format!("Tool \"{}\" not found in registry", request.name))?;
        lock_unpoisoned(&self.executions).push(request.call_id.clone());

        if let Some(gate) = &tool.gate {
            tokio::select! {
                _ = cancel.cancelled() => return Err("Tool execution cancelled".to_string()),
                _ = gate.notified() => {}
            }
        }
        if !tool.delay.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return Err("Tool execution cancelled".to_string()),
                _ = tokio::time::sleep(tool.delay) => {}
            }
        }

        match &tool.behavior {
            ToolBehavior::Fixed(outcome) => outcome.clone(),
            ToolBehavior::ListDirectory { root } => list_directory(root, &request.args),
        }
    }
}

fn list_directory(root: &Path, args: &Value) -> Result<Value, String> {
    let relative = args.get("path").and_then(Value::as_str).unwrap_or(".");
    let dir = root.join(relative);
    let entries = std::fs::read_dir(&dir)
        .map_err(|error| format!("Failed to list {}: {error}", dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|error| format!("Failed to list {}: {error}", dir.display()))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    Ok(Value::from(names))
}
