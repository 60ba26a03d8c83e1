//! Desktop shell for an AI coding assistant.
//!
//! Wires the privileged host ([`shell_host`]) to the unprivileged UI replica
//! ([`shell_ui`]), either over in-process channels or across a child
//! process's stdio, and drives the UI from a line-oriented front end.
//!
//! # Layout
//! - [`cli`]: command-line arguments.
//! - [`config`]: `DESK_SHELL_*` environment configuration.
//! - [`logging`]: `tracing` subscriber bootstrap.
//! - [`providers`]: agent backend selection by provider id.
//! - [`launch`]: spawns the host service, in process or as `desk-shell --host`,
//!   and connects a UI runtime to it.
//! - [`driver`] and [`commands`]: the stdin front end and its slash commands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod driver;
pub mod launch;
pub mod logging;
pub mod providers;

pub use config::EnvConfig;
pub use launch::{launch, LaunchedShell};
