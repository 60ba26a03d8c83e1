//! Privileged side of the shell.
//!
//! Owns the agent connection for the current session and exposes it to the
//! UI only through [`HostService`]: commands in, notifications out through a
//! [`StreamRelay`]. A turn is driven by the [`TurnController`]; tool calls it
//! encounters are tracked by the [`ToolCallLedger`], which pauses on the
//! [`ConfirmationGateway`] when the approval policy asks for a human decision.

use std::sync::{Mutex, MutexGuard};

pub mod config;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod relay;
pub mod service;
pub mod session;

pub use config::HostConfig;
pub use controller::{TurnController, TurnOutcome};
pub use error::{GatewayError, LedgerError, SessionError, TurnError};
pub use gateway::ConfirmationGateway;
pub use ledger::{CompletedToolCall, LedgerObserver, ToolCallLedger};
pub use relay::StreamRelay;
pub use service::HostService;
pub use session::{SessionLifecycle, ShellSession};

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
