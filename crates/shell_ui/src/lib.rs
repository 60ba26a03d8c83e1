//! Unprivileged side of the shell.
//!
//! [`ConversationStore`] is a replica of the conversation built only from
//! relayed host notifications and local user actions. [`UiRuntime`] feeds it
//! from the host channels and forwards user decisions as commands.

pub mod runtime;
pub mod store;

pub use runtime::{CommandBridge, UiEvent, UiRuntime};
pub use store::{
    AwaitingDecision, ConversationMessage, ConversationStore, HostOps, Notice, Role, StoreError,
    ToolCallView, TurnState,
};
