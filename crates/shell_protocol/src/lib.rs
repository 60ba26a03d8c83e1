//! Message contract between the privileged agent host and the UI process.
//!
//! Both sides share no memory. Everything that crosses the boundary is one of
//! the types in this crate: a [`Command`] travelling UI -> host (answered by a
//! [`Response`] or a [`CommandError`]), or a [`Notification`] travelling
//! host -> UI on one of the fixed channels in [`channels`].
//!
//! [`channel`] provides in-process transports with those semantics and
//! [`wire`] frames the same messages as JSON lines for an OS-level pipe.

pub mod channel;
mod command;
mod event;
mod notification;
mod tool;
pub mod wire;

pub use command::{
    Ack, ApprovalMode, Command, CommandError, InitializeParams, InitializeResult, Response,
    SendResult, Settings,
};
pub use event::{ErrorInfo, FinishedInfo, StreamEvent, ToolCallRequest, ToolCallResponse};
pub use notification::{channels, Notification};
pub use tool::{
    ConfirmationOutcome, ConfirmationRequest, ExecutionFailure, ExecutionSuccess, ToolCallSnapshot,
    ToolCallStatus, ToolCallSummary, ToolStatusChange,
};

/// Correlation identifier linking a tool request, its confirmation and its result.
pub type CallId = String;
