use std::collections::HashMap;
use std::sync::Mutex;

use shell_protocol::{CallId, ConfirmationOutcome, ConfirmationRequest, Notification};
use tokio::sync::oneshot;

use crate::error::GatewayError;
use crate::lock_unpoisoned;
use crate::relay::StreamRelay;

/// Table of single-use resume capabilities for paused tool calls.
///
/// The capability never leaves this process; the UI only sees the call id. A
/// capability is removed the moment it is used, so a second decision for the
/// same call finds nothing.
#[derive(Debug)]
pub struct ConfirmationGateway {
    relay: StreamRelay,
    pending: Mutex<HashMap<CallId, oneshot::Sender<ConfirmationOutcome>>>,
}

impl ConfirmationGateway {
    #[must_use]
    pub fn new(relay: StreamRelay) -> Self {
        Self {
            relay,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a capability for `request.correlation_id` and asks the UI
    /// for a decision.
    ///
    /// The returned receiver yields the decision, or an error once the
    /// capability is revoked.
    pub fn request_confirmation(
        &self,
        request: ConfirmationRequest,
    ) -> Result<oneshot::Receiver<ConfirmationOutcome>, GatewayError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock_unpoisoned(&self.pending);
            if pending.contains_key(&request.correlation_id) {
                return Err(GatewayError::AlreadyPending {
                    call_id: request.correlation_id,
                });
            }
            pending.insert(request.correlation_id.clone(), tx);
        }

        tracing::debug!(call_id = %request.correlation_id, "awaiting confirmation");
        self.relay
            .notify(Notification::ConfirmationRequest(request));
        Ok(rx)
    }

    /// Resumes exactly the paused call identified by `call_id`.
    pub fn resolve(&self, call_id: &str, outcome: ConfirmationOutcome) -> Result<(), GatewayError> {
        let Some(capability) = lock_unpoisoned(&self.pending).remove(call_id) else {
            tracing::warn!(call_id, "late or duplicate confirmation decision");
            return Err(GatewayError::no_pending(call_id));
        };

        tracing::info!(call_id, proceed = outcome.is_proceed(), "confirmation resolved");
        capability
            .send(outcome)
            .map_err(|_| GatewayError::no_pending(call_id))
    }

    /// Drops the capability for `call_id` without resuming it.
    pub fn revoke(&self, call_id: &str) -> bool {
        lock_unpoisoned(&self.pending).remove(call_id).is_some()
    }

    /// Drops every capability; each paused call observes a cancellation.
    pub fn revoke_all(&self) -> usize {
        let mut pending = lock_unpoisoned(&self.pending);
        let count = pending.len();
        pending.clear();
        count
    }

    /// Call ids currently awaiting a decision, sorted.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<CallId> {
        let mut ids: Vec<CallId> = lock_unpoisoned(&self.pending).keys().cloned().collect();
        ids.sort();
        ids
    }
}
