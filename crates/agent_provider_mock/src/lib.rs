//! Deterministic mock implementation of the `agent_provider` contract.
//!
//! Agents replay scripted [`Round`]s, one per request; tools return canned
//! outcomes and can be held open with a gate so tests control completion order.
//! Nothing here talks to a network.

use std::sync::{Mutex, MutexGuard};

mod agent;
mod backend;
mod script;
mod tools;

pub use agent::{RecordedRequest, ScriptedAgent};
pub use backend::MockBackend;
pub use script::{Round, Step};
pub use tools::{MockTool, MockToolRuntime, ToolBehavior};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
