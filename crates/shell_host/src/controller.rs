//! Drives one conversational turn from user message to completion.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agent_provider::{AgentClient, AgentError, Part};
use futures_util::StreamExt;
use shell_protocol::{SendResult, StreamEvent, ToolCallRequest};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::TurnError;
use crate::ledger::ToolCallLedger;
use crate::lock_unpoisoned;
use crate::relay::StreamRelay;

const REMEMBERED_OUTCOMES: usize = 64;

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Aborted,
    Failed(String),
}

impl From<TurnOutcome> for SendResult {
    fn from(outcome: TurnOutcome) -> Self {
        match outcome {
            TurnOutcome::Completed => SendResult::completed(),
            TurnOutcome::Aborted => SendResult::aborted(),
            TurnOutcome::Failed(error) => SendResult::failed(error),
        }
    }
}

struct ActiveTurn {
    prompt_id: String,
    cancel: CancellationToken,
    done: watch::Receiver<Option<TurnOutcome>>,
}

#[derive(Default)]
struct ControllerState {
    active: Option<ActiveTurn>,
    finished: VecDeque<(String, TurnOutcome)>,
}

enum Admission {
    Start(watch::Sender<Option<TurnOutcome>>, CancellationToken),
    Join(watch::Receiver<Option<TurnOutcome>>),
    Replay(TurnOutcome),
}

/// Orchestrates turns for one session. At most one turn runs at a time.
pub struct TurnController {
    client: Arc<dyn AgentClient>,
    ledger: Arc<ToolCallLedger>,
    relay: StreamRelay,
    max_tool_rounds: usize,
    state: Mutex<ControllerState>,
}

impl TurnController {
    #[must_use]
    pub fn new(
        client: Arc<dyn AgentClient>,
        ledger: Arc<ToolCallLedger>,
        relay: StreamRelay,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            client,
            ledger,
            relay,
            max_tool_rounds,
            state: Mutex::new(ControllerState::default()),
        }
    }

    /// Runs the turn for `prompt_id` to completion, relaying its events.
    ///
    /// Repeating a prompt id joins the running turn or replays the outcome of
    /// the finished one instead of sending the message again. A different
    /// prompt id while a turn is running is refused.
    pub async fn start_turn(
        &self,
        message: String,
        prompt_id: String,
    ) -> Result<TurnOutcome, TurnError> {
        let (done, cancel) = match self.admit(&prompt_id)? {
            Admission::Start(done, cancel) => (done, cancel),
            Admission::Join(receiver) => return Ok(wait_for_outcome(receiver).await),
            Admission::Replay(outcome) => return Ok(outcome),
        };

        tracing::info!(prompt_id = %prompt_id, "turn started");
        let _release = ReleaseOnDrop {
            state: &self.state,
            prompt_id: &prompt_id,
        };
        let _disconnect_watch = self.relay.cancel_on_disconnect(cancel.clone());
        let outcome = self.drive(message, &prompt_id, &cancel).await;
        tracing::info!(prompt_id = %prompt_id, ?outcome, "turn ended");

        {
            let mut state = lock_unpoisoned(&self.state);
            state.active = None;
            state.finished.push_back((prompt_id.clone(), outcome.clone()));
            while state.finished.len() > REMEMBERED_OUTCOMES {
                state.finished.pop_front();
            }
        }
        let _ = done.send(Some(outcome.clone()));
        Ok(outcome)
    }

    /// Cancels the active turn, if any. Returns whether a turn was running.
    pub fn abort(&self) -> bool {
        match lock_unpoisoned(&self.state).active.as_ref() {
            Some(active) => {
                tracing::info!(prompt_id = %active.prompt_id, "aborting turn");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels the active turn and waits until it has fully ended.
    pub async fn abort_and_wait(&self) {
        let receiver = {
            let state = lock_unpoisoned(&self.state);
            match state.active.as_ref() {
                Some(active) => {
                    active.cancel.cancel();
                    Some(active.done.clone())
                }
                None => None,
            }
        };

        if let Some(receiver) = receiver {
            let _ = wait_for_outcome(receiver).await;
        }
    }

    #[must_use]
    pub fn active_prompt_id(&self) -> Option<String> {
        lock_unpoisoned(&self.state)
            .active
            .as_ref()
            .map(|active| active.prompt_id.clone())
    }

    /// Forgets remembered outcomes so prompt ids may be reused.
    pub fn forget_outcomes(&self) {
        lock_unpoisoned(&self.state).finished.clear();
    }

    fn admit(&self, prompt_id: &str) -> Result<Admission, TurnError> {
        let mut state = lock_unpoisoned(&self.state);

        if let Some(active) = state.active.as_ref() {
            if active.prompt_id == prompt_id {
                return Ok(Admission::Join(active.done.clone()));
            }
            return Err(TurnError::TurnActive {
                active_prompt_id: active.prompt_id.clone(),
            });
        }

        if let Some((_, outcome)) = state.finished.iter().find(|(id, _)| id == prompt_id) {
            return Ok(Admission::Replay(outcome.clone()));
        }

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(None);
        state.active = Some(ActiveTurn {
            prompt_id: prompt_id.to_string(),
            cancel: cancel.clone(),
            done: done_rx,
        });
        Ok(Admission::Start(done_tx, cancel))
    }

    async fn drive(
        &self,
        message: String,
        prompt_id: &str,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let mut parts = vec![Part::text(message)];
        let mut rounds = 0usize;

        loop {
            let requests = match self.stream_round(parts, prompt_id, cancel).await {
                Ok(requests) => requests,
                Err(outcome) => return outcome,
            };
            if requests.is_empty() {
                return TurnOutcome::Completed;
            }

            let completed = self.ledger.run_batch(requests, cancel.clone()).await;
            if cancel.is_cancelled() {
                return self.cancelled();
            }

            for call in &completed {
                self.relay
                    .emit_event(StreamEvent::ToolCallResponse(call.response_event()));
            }

            parts = completed
                .iter()
                .filter_map(|call| call.response_part())
                .collect();
            if parts.is_empty() {
                return TurnOutcome::Completed;
            }

            rounds += 1;
            if rounds > self.max_tool_rounds {
                let message = format!(
                    "Turn exceeded the limit of {} tool rounds",
                    self.max_tool_rounds
                );
                tracing::warn!(prompt_id, "{message}");
                self.relay.emit_event(StreamEvent::error(message.clone()));
                return TurnOutcome::Failed(message);
            }
            tracing::debug!(prompt_id, round = rounds, parts = parts.len(), "continuing turn");
        }
    }

    /// Streams one agent request, relaying each event as it arrives.
    ///
    /// Returns the tool calls requested by the stream, or the outcome that
    /// ends the turn early.
    async fn stream_round(
        &self,
        parts: Vec<Part>,
        prompt_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ToolCallRequest>, TurnOutcome> {
        let mut stream = self
            .client
            .send_message_stream(parts, cancel.clone(), prompt_id);
        let mut requests = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled()),
                next = stream.next() => next,
            };

            match next {
                None => return Ok(requests),
                Some(Ok(event)) => {
                    if cancel.is_cancelled() {
                        return Err(self.cancelled());
                    }

                    let ends_turn = match &event {
                        StreamEvent::ToolCallRequest(request) => {
                            let mut request = request.clone();
                            request
                                .prompt_id
                                .get_or_insert_with(|| prompt_id.to_string());
                            requests.push(request);
                            None
                        }
                        StreamEvent::Error(info) => Some(TurnOutcome::Failed(info.error.clone())),
                        StreamEvent::UserCancelled => Some(TurnOutcome::Aborted),
                        _ => None,
                    };

                    self.relay.emit_event(event);
                    if let Some(outcome) = ends_turn {
                        return Err(outcome);
                    }
                }
                Some(Err(AgentError::Aborted)) => return Err(self.cancelled()),
                Some(Err(AgentError::Failed(error))) => {
                    tracing::warn!(prompt_id, %error, "agent stream failed");
                    self.relay.emit_event(StreamEvent::error(error.clone()));
                    return Err(TurnOutcome::Failed(error));
                }
            }
        }
    }

    fn cancelled(&self) -> TurnOutcome {
        self.relay.emit_event(StreamEvent::UserCancelled);
        TurnOutcome::Aborted
    }
}

/// Frees the active slot if a turn future is dropped before it finishes.
struct ReleaseOnDrop<'a> {
    state: &'a Mutex<ControllerState>,
    prompt_id: &'a str,
}

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        let mut state = lock_unpoisoned(self.state);
        if state
            .active
            .as_ref()
            .is_some_and(|active| active.prompt_id == self.prompt_id)
        {
            state.active = None;
        }
    }
}

async fn wait_for_outcome(mut receiver: watch::Receiver<Option<TurnOutcome>>) -> TurnOutcome {
    loop {
        if let Some(outcome) = receiver.borrow_and_update().clone() {
            return outcome;
        }
        if receiver.changed().await.is_err() {
            return receiver
                .borrow()
                .clone()
                .unwrap_or(TurnOutcome::Aborted);
        }
    }
}
