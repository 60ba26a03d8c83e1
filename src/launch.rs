use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use agent_provider::AgentBackend;
use shell_host::{HostConfig, HostService, StreamRelay};
use shell_protocol::channel::{command_channel, notification_channel};
use shell_protocol::wire::{connect_frames, serve_frames, WireError};
use shell_protocol::{
    ApprovalMode, Command, CommandError, InitializeParams, InitializeResult, Response,
};
use shell_ui::UiRuntime;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::task::JoinHandle;

/// Flag that makes the binary serve a host on its stdio.
pub const HOST_FLAG: &str = "--host";

enum HostHandle {
    Task(JoinHandle<()>),
    Process {
        child: Child,
        pipe: JoinHandle<Result<(), WireError>>,
    },
}

/// Both halves of the shell, wired together in one process or across a pipe.
pub struct LaunchedShell {
    pub runtime: UiRuntime,
    host: HostHandle,
}

/// Starts the host service for `backend` and a UI runtime connected to it.
///
/// Must be called from within a Tokio runtime.
pub fn launch(backend: Arc<dyn AgentBackend>, config: HostConfig) -> LaunchedShell {
    let (commands, command_rx) = command_channel();
    let (notify, notifications) = notification_channel();
    let service = Arc::new(HostService::new(backend, config, StreamRelay::new(notify)));
    let host = tokio::spawn(service.serve(command_rx));

    LaunchedShell {
        runtime: UiRuntime::new(commands, notifications),
        host: HostHandle::Task(host),
    }
}

/// Runs `program --host` as a child process and connects a UI runtime to its
/// stdio. The child picks its provider and limits from the inherited
/// environment and is killed if the shell is dropped without a shutdown.
pub fn launch_isolated(program: impl AsRef<OsStr>) -> io::Result<LaunchedShell> {
    let mut child = tokio::process::Command::new(program)
        .arg(HOST_FLAG)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::other("host stdin is not piped"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("host stdout is not piped"))?;
    tracing::debug!(pid = ?child.id(), "host process started");

    Ok(connect(stdout, stdin, |pipe| HostHandle::Process { child, pipe }))
}

/// Connects a UI runtime to a host already serving frames on `reader` and
/// `writer`.
pub fn launch_over<R, W>(reader: R, writer: W) -> LaunchedShell
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    connect(reader, writer, |pipe| {
        HostHandle::Task(tokio::spawn(async move {
            match pipe.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => tracing::warn!(%error, "host pipe failed"),
                Err(error) => tracing::warn!(%error, "host pipe task ended abnormally"),
            }
        }))
    })
}

fn connect<R, W>(
    reader: R,
    writer: W,
    host: impl FnOnce(JoinHandle<Result<(), WireError>>) -> HostHandle,
) -> LaunchedShell
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (commands, command_rx) = command_channel();
    let (notify, notifications) = notification_channel();
    let pipe = tokio::spawn(connect_frames(reader, writer, command_rx, notify));

    LaunchedShell {
        runtime: UiRuntime::new(commands, notifications),
        host: host(pipe),
    }
}

/// Serves a host for `backend` on a frame pipe until the UI hangs up and the
/// session is disposed.
pub async fn serve_host<R, W>(
    backend: Arc<dyn AgentBackend>,
    config: HostConfig,
    reader: R,
    writer: W,
) -> Result<(), WireError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (commands, command_rx) = command_channel();
    let (notify, notifications) = notification_channel();
    let service = Arc::new(HostService::new(backend, config, StreamRelay::new(notify)));
    let host = tokio::spawn(service.serve(command_rx));

    let piped = serve_frames(reader, writer, commands, notifications).await;
    if let Err(error) = host.await {
        tracing::warn!(%error, "host task ended abnormally");
    }
    piped
}

impl LaunchedShell {
    pub async fn initialize(
        &self,
        target_dir: impl Into<PathBuf>,
        approval_mode: Option<ApprovalMode>,
    ) -> Result<InitializeResult, CommandError> {
        let mut params = InitializeParams::new(target_dir);
        params.approval_mode = approval_mode;
        self.initialize_with(params).await
    }

    pub async fn initialize_with(
        &self,
        params: InitializeParams,
    ) -> Result<InitializeResult, CommandError> {
        let command = Command::Initialize(params);
        let channel = command.channel();
        match self.runtime.commands().invoke(command).await? {
            Response::Initialized(result) => Ok(result),
            other => Err(CommandError::unexpected_response(channel, &other)),
        }
    }

    /// Drops the UI side and waits for the host to dispose its session.
    pub async fn shutdown(self) {
        let Self { runtime, host } = self;
        drop(runtime);
        match host {
            HostHandle::Task(task) => {
                if let Err(error) = task.await {
                    tracing::warn!(%error, "host task ended abnormally");
                }
            }
            HostHandle::Process { mut child, pipe } => {
                match pipe.await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => tracing::warn!(%error, "host pipe failed"),
                    Err(error) => tracing::warn!(%error, "host pipe task ended abnormally"),
                }
                match child.wait().await {
                    Ok(status) if !status.success() => {
                        tracing::warn!(%status, "host process exited with a failure");
                    }
                    Ok(_) => {}
                    Err(error) => tracing::warn!(%error, "failed to reap host process"),
                }
            }
        }
    }
}
