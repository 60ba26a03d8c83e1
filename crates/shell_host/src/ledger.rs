//! Per-turn tracking of tool calls from request to terminal status.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use agent_provider::{Part, ToolCheck, ToolRuntime};
use futures_util::future::join_all;
use serde_json::{json, Value};
use shell_protocol::{
    ApprovalMode, CallId, ConfirmationOutcome, ConfirmationRequest, ExecutionFailure,
    ExecutionSuccess, Notification, ToolCallRequest, ToolCallResponse, ToolCallSnapshot,
    ToolCallStatus, ToolCallSummary, ToolStatusChange,
};
use tokio_util::sync::CancellationToken;

use crate::error::LedgerError;
use crate::gateway::ConfirmationGateway;
use crate::lock_unpoisoned;
use crate::relay::StreamRelay;

const CANCELLED_MESSAGE: &str = "Tool call cancelled";

/// Receives ledger activity.
///
/// Callbacks run while the ledger lock is held so observers see transitions
/// in the order they happened. Implementations must not block or call back
/// into the ledger.
pub trait LedgerObserver: Send + Sync + 'static {
    /// Full list of tracked calls after a transition.
    fn on_calls_updated(&self, snapshot: Vec<ToolCallSnapshot>);

    /// The single call that just moved, sent after its snapshot.
    fn on_status_changed(&self, _change: ToolStatusChange) {}

    fn on_execution_success(&self, _success: ExecutionSuccess) {}

    fn on_execution_failure(&self, _failure: ExecutionFailure) {}

    /// Every call of a batch reached a terminal status.
    fn on_batch_complete(&self, _completed: &[CompletedToolCall]) {}
}

impl LedgerObserver for StreamRelay {
    fn on_calls_updated(&self, snapshot: Vec<ToolCallSnapshot>) {
        self.notify(Notification::ToolCallsUpdated(snapshot));
    }

    fn on_status_changed(&self, change: ToolStatusChange) {
        self.notify(Notification::ToolStatusChanged(change));
    }

    fn on_execution_success(&self, success: ExecutionSuccess) {
        self.notify(Notification::ExecutionSuccess(success));
    }

    fn on_execution_failure(&self, failure: ExecutionFailure) {
        self.notify(Notification::ExecutionFailure(failure));
    }
}

/// Terminal record of one call, as handed to the turn controller.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedToolCall {
    pub call_id: CallId,
    pub name: String,
    pub status: ToolCallStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    /// The user declined the call at the confirmation step.
    pub rejected: bool,
}

impl CompletedToolCall {
    /// Result the agent should see for this call, if any.
    ///
    /// Calls cancelled by an abort produce nothing; a declined call tells the
    /// agent the user said no.
    #[must_use]
    pub fn response_part(&self) -> Option<Part> {
        let response = match self.status {
            ToolCallStatus::Success => {
                json!({ "output": self.result.clone().unwrap_or(Value::Null) })
            }
            ToolCallStatus::Error => json!({ "error": self.error_text() }),
            ToolCallStatus::Cancelled if self.rejected => json!({ "error": self.error_text() }),
            _ => return None,
        };
        Some(Part::function_response(
            self.call_id.clone(),
            self.name.clone(),
            response,
        ))
    }

    #[must_use]
    pub fn response_event(&self) -> ToolCallResponse {
        match self.status {
            ToolCallStatus::Success => ToolCallResponse {
                call_id: self.call_id.clone(),
                result: self.result.clone(),
                error: None,
            },
            _ => ToolCallResponse {
                call_id: self.call_id.clone(),
                result: None,
                error: Some(self.error_text()),
            },
        }
    }

    fn error_text(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| CANCELLED_MESSAGE.to_string())
    }
}

#[derive(Debug, Clone)]
struct TrackedCall {
    request: ToolCallRequest,
    status: ToolCallStatus,
    result: Option<Value>,
    error: Option<String>,
    rejected: bool,
}

impl TrackedCall {
    fn snapshot(&self) -> ToolCallSnapshot {
        ToolCallSnapshot {
            call_id: self.request.call_id.clone(),
            name: self.request.name.clone(),
            args: self.request.args.clone(),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }

    fn completed(&self) -> CompletedToolCall {
        CompletedToolCall {
            call_id: self.request.call_id.clone(),
            name: self.request.name.clone(),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            rejected: self.rejected,
        }
    }
}

#[derive(Debug, Default)]
struct Details {
    result: Option<Value>,
    error: Option<String>,
    rejected: bool,
}

/// Tracks every tool call of the current turn and drives each through
/// validation, optional confirmation and execution.
pub struct ToolCallLedger {
    tools: Arc<dyn ToolRuntime>,
    approval_mode: ApprovalMode,
    gateway: Arc<ConfirmationGateway>,
    observer: Arc<dyn LedgerObserver>,
    calls: Mutex<Vec<TrackedCall>>,
}

impl ToolCallLedger {
    #[must_use]
    pub fn new(
        tools: Arc<dyn ToolRuntime>,
        approval_mode: ApprovalMode,
        gateway: Arc<ConfirmationGateway>,
        observer: Arc<dyn LedgerObserver>,
    ) -> Self {
        Self {
            tools,
            approval_mode,
            gateway,
            observer,
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<ToolCallSnapshot> {
        lock_unpoisoned(&self.calls)
            .iter()
            .map(TrackedCall::snapshot)
            .collect()
    }

    #[must_use]
    pub fn status_of(&self, call_id: &str) -> Option<ToolCallStatus> {
        lock_unpoisoned(&self.calls)
            .iter()
            .find(|call| call.request.call_id == call_id)
            .map(|call| call.status)
    }

    /// Drops every tracked call. Calls still in flight stop being tracked.
    pub fn clear(&self) {
        let mut calls = lock_unpoisoned(&self.calls);
        calls.clear();
        self.observer.on_calls_updated(Vec::new());
    }

    /// Schedules every request concurrently and returns once all of them are
    /// terminal, in request order.
    ///
    /// Requests repeating a call id already in the batch are dropped.
    pub async fn run_batch(
        &self,
        requests: Vec<ToolCallRequest>,
        cancel: CancellationToken,
    ) -> Vec<CompletedToolCall> {
        self.forget_finished();

        let mut seen = HashSet::new();
        let unique: Vec<ToolCallRequest> = requests
            .into_iter()
            .filter(|request| {
                let fresh = seen.insert(request.call_id.clone());
                if !fresh {
                    tracing::warn!(
                        call_id = %request.call_id,
                        "dropping duplicate tool call request"
                    );
                }
                fresh
            })
            .collect();

        tracing::info!(calls = unique.len(), "scheduling tool batch");
        let outcomes = join_all(
            unique
                .iter()
                .map(|request| self.schedule(request.clone(), cancel.clone())),
        )
        .await;

        let completed: Vec<CompletedToolCall> = unique
            .iter()
            .zip(outcomes)
            .map(|(request, outcome)| match outcome {
                Ok(completed) => completed,
                Err(error) => {
                    tracing::warn!(
                        call_id = %request.call_id,
                        %error,
                        "tool call was not scheduled"
                    );
                    CompletedToolCall {
                        call_id: request.call_id.clone(),
                        name: request.name.clone(),
                        status: ToolCallStatus::Error,
                        result: None,
                        error: Some(error.to_string()),
                        rejected: false,
                    }
                }
            })
            .collect();

        self.observer.on_batch_complete(&completed);
        completed
    }

    /// Drives one call to a terminal status.
    ///
    /// Failures after the call is tracked are recorded as `error`; the only
    /// error returned is a call id that is already in flight.
    pub async fn schedule(
        &self,
        request: ToolCallRequest,
        cancel: CancellationToken,
    ) -> Result<CompletedToolCall, LedgerError> {
        self.track(&request)?;
        let call_id = request.call_id.clone();

        let terminal = self.drive(&request, &cancel).await;
        let status = match terminal {
            Ok(status) => status,
            Err(error) => {
                tracing::warn!(call_id = %call_id, %error, "tool call scheduling failed");
                let _ = self.transition(
                    &call_id,
                    ToolCallStatus::Error,
                    Details {
                        error: Some(error.to_string()),
                        ..Details::default()
                    },
                );
                ToolCallStatus::Error
            }
        };

        Ok(self.completed(&call_id).unwrap_or_else(|| CompletedToolCall {
            call_id: call_id.clone(),
            name: request.name.clone(),
            status,
            result: None,
            error: None,
            rejected: false,
        }))
    }

    async fn drive(
        &self,
        request: &ToolCallRequest,
        cancel: &CancellationToken,
    ) -> Result<ToolCallStatus, LedgerError> {
        let call_id = request.call_id.as_str();
        self.advance(call_id, ToolCallStatus::Validating)?;
        if cancel.is_cancelled() {
            return self.cancel(call_id);
        }

        let check = match self.tools.prepare(request, self.approval_mode) {
            Ok(check) => check,
            Err(error) => return self.fail(request, error),
        };

        if check == ToolCheck::NeedsConfirmation {
            self.advance(call_id, ToolCallStatus::AwaitingApproval)?;
            let decision = self
                .gateway
                .request_confirmation(ConfirmationRequest {
                    correlation_id: call_id.to_string(),
                    tool_call: ToolCallSummary {
                        name: request.name.clone(),
                        args: request.args.clone(),
                    },
                })?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.gateway.revoke(call_id);
                    return self.cancel(call_id);
                }
                outcome = decision => outcome,
            };

            match outcome {
                Ok(ConfirmationOutcome::ProceedOnce) => {}
                Ok(ConfirmationOutcome::Cancel { reason }) => {
                    let message = match reason {
                        Some(reason) => format!("User rejected tool call: {reason}"),
                        None => "User rejected tool call".to_string(),
                    };
                    return self.transition(
                        call_id,
                        ToolCallStatus::Cancelled,
                        Details {
                            error: Some(message),
                            rejected: true,
                            ..Details::default()
                        },
                    );
                }
                Err(_) => return self.cancel(call_id),
            }
        }

        self.advance(call_id, ToolCallStatus::Scheduled)?;
        if cancel.is_cancelled() {
            return self.cancel(call_id);
        }
        self.advance(call_id, ToolCallStatus::Executing)?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return self.cancel(call_id),
            outcome = self.tools.execute(request, cancel.clone()) => outcome,
        };

        match outcome {
            Ok(result) => {
                let status = self.transition(
                    call_id,
                    ToolCallStatus::Success,
                    Details {
                        result: Some(result.clone()),
                        ..Details::default()
                    },
                )?;
                self.observer.on_execution_success(ExecutionSuccess {
                    correlation_id: call_id.to_string(),
                    tool_name: request.name.clone(),
                    result,
                });
                Ok(status)
            }
            Err(_) if cancel.is_cancelled() => self.cancel(call_id),
            Err(error) => self.fail(request, error),
        }
    }

    fn track(&self, request: &ToolCallRequest) -> Result<(), LedgerError> {
        let mut calls = lock_unpoisoned(&self.calls);
        if let Some(existing) = calls
            .iter()
            .position(|call| call.request.call_id == request.call_id)
        {
            if !calls[existing].status.is_terminal() {
                return Err(LedgerError::DuplicateCall {
                    call_id: request.call_id.clone(),
                });
            }
            calls.remove(existing);
        }

        calls.push(TrackedCall {
            request: request.clone(),
            status: ToolCallStatus::Pending,
            result: None,
            error: None,
            rejected: false,
        });
        tracing::debug!(call_id = %request.call_id, name = %request.name, "tool call pending");
        self.observer
            .on_calls_updated(calls.iter().map(TrackedCall::snapshot).collect());
        self.observer.on_status_changed(ToolStatusChange {
            correlation_id: request.call_id.clone(),
            tool_name: request.name.clone(),
            status: ToolCallStatus::Pending,
        });
        Ok(())
    }

    fn advance(&self, call_id: &str, next: ToolCallStatus) -> Result<ToolCallStatus, LedgerError> {
        self.transition(call_id, next, Details::default())
    }

    fn cancel(&self, call_id: &str) -> Result<ToolCallStatus, LedgerError> {
        self.transition(
            call_id,
            ToolCallStatus::Cancelled,
            Details {
                error: Some(CANCELLED_MESSAGE.to_string()),
                ..Details::default()
            },
        )
    }

    fn fail(
        &self,
        request: &ToolCallRequest,
        error: String,
    ) -> Result<ToolCallStatus, LedgerError> {
        let status = self.transition(
            &request.call_id,
            ToolCallStatus::Error,
            Details {
                error: Some(error.clone()),
                ..Details::default()
            },
        )?;
        self.observer.on_execution_failure(ExecutionFailure {
            correlation_id: request.call_id.clone(),
            tool_name: request.name.clone(),
            error,
        });
        Ok(status)
    }

    /// Applies one transition and broadcasts the resulting snapshot.
    fn transition(
        &self,
        call_id: &str,
        next: ToolCallStatus,
        details: Details,
    ) -> Result<ToolCallStatus, LedgerError> {
        let mut calls = lock_unpoisoned(&self.calls);
        let call = calls
            .iter_mut()
            .find(|call| call.request.call_id == call_id)
            .ok_or_else(|| LedgerError::UnknownCall {
                call_id: call_id.to_string(),
            })?;

        if !call.status.can_advance_to(next) {
            return Err(LedgerError::InvalidTransition {
                call_id: call_id.to_string(),
                from: call.status,
                to: next,
            });
        }

        tracing::debug!(call_id, from = %call.status, to = %next, "tool call transition");
        call.status = next;
        call.result = details.result;
        call.error = details.error;
        call.rejected = details.rejected;
        let change = ToolStatusChange {
            correlation_id: call.request.call_id.clone(),
            tool_name: call.request.name.clone(),
            status: next,
        };

        self.observer
            .on_calls_updated(calls.iter().map(TrackedCall::snapshot).collect());
        self.observer.on_status_changed(change);
        Ok(next)
    }

    fn completed(&self, call_id: &str) -> Option<CompletedToolCall> {
        lock_unpoisoned(&self.calls)
            .iter()
            .find(|call| call.request.call_id == call_id)
            .map(TrackedCall::completed)
    }

    fn forget_finished(&self) {
        lock_unpoisoned(&self.calls).retain(|call| !call.status.is_terminal());
    }
}
