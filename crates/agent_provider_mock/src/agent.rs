use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agent_provider::{AgentClient, AgentError, EventStream, Part, ProviderProfile};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::script::{Round, Step};
use crate::{lock_unpoisoned, MOCK_PROVIDER_ID};

type Responder = dyn Fn(&[Part]) -> Round + Send + Sync;

/// One request observed by a [`ScriptedAgent`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub prompt_id: String,
    pub parts: Vec<Part>,
}

/// Agent that replays queued rounds, then falls back to a responder.
pub struct ScriptedAgent {
    model_id: String,
    rounds: Mutex<VecDeque<Round>>,
    responder: Arc<Responder>,
    requests: Mutex<Vec<RecordedRequest>>,
    history: Mutex<Vec<Value>>,
}

impl ScriptedAgent {
    /// Agent that plays `rounds` in order and finishes every later request.
    #[must_use]
    pub fn new(rounds: Vec<Round>) -> Self {
        Self::with_responder(rounds, |_parts| Round::finished())
    }

    #[must_use]
    pub fn with_responder(
        rounds: Vec<Round>,
        responder: impl Fn(&[Part]) -> Round + Send + Sync + 'static,
    ) -> Self {
        Self {
            model_id: "mock".to_string(),
            rounds: Mutex::new(rounds.into()),
            responder: Arc::new(responder),
            requests: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Appends a round to the script.
    pub fn push_round(&self, round: Round) {
        lock_unpoisoned(&self.rounds).push_back(round);
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    #[must_use]
    pub fn remaining_rounds(&self) -> usize {
        lock_unpoisoned(&self.rounds).len()
    }

    fn next_round(&self, parts: &[Part]) -> Round {
        lock_unpoisoned(&self.rounds)
            .pop_front()
            .unwrap_or_else(|| (self.responder)(parts))
    }
}

struct StreamState {
    steps: VecDeque<Step>,
    cancel: CancellationToken,
    done: bool,
}

#[async_trait]
impl AgentClient for ScriptedAgent {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn send_message_stream(
        &self,
        parts: Vec<Part>,
        cancel: CancellationToken,
        prompt_id: &str,
    ) -> EventStream {
        let round = self.next_round(&parts);
        tracing::debug!(prompt_id, parts = parts.len(), "mock agent request");

        {
            let mut history = lock_unpoisoned(&self.history);
            history.push(json!({ "role": "user", "parts": parts }));
            let text = round.text();
            if !text.is_empty() {
                history.push(json!({ "role": "model", "parts": [{ "text": text }] }));
            }
        }
        lock_unpoisoned(&self.requests).push(RecordedRequest {
            prompt_id: prompt_id.to_string(),
            parts,
        });

        let state = StreamState {
            steps: round.into_steps().into(),
            cancel,
            done: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }

            loop {
                if state.cancel.is_cancelled() {
                    state.done = true;
                    return Some((Err(AgentError::Aborted), state));
                }

                match state.steps.pop_front()? {
                    Step::Emit(event) => return Some((Ok(event), state)),
                    Step::Delay(duration) => {
                        tokio::select! {
                            _ = state.cancel.cancelled() => {}
                            _ = tokio::time::sleep(duration) => {}
                        }
                    }
                    Step::WaitForCancel => state.cancel.cancelled().await,
                    Step::Fail(message) => {
                        state.done = true;
                        return Some((Err(AgentError::Failed(message)), state));
                    }
                }
            }
        })
        .boxed()
    }

    fn history(&self) -> Vec<Value> {
        lock_unpoisoned(&self.history).clone()
    }

    async fn reset(&self) -> Result<(), AgentError> {
        lock_unpoisoned(&self.history).clear();
        Ok(())
    }
}
