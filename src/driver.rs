//! Line-oriented front end over the UI runtime.
//!
//! Plain lines start a turn; slash commands decide pending tool calls and
//! query the host. Input that arrives while a turn is streaming is held until
//! the turn either finishes or waits on a decision, so a scripted session can
//! be piped in. `/abort`, `/quit` and `/help` act immediately.

use std::collections::VecDeque;
use std::io::{self, Write};

use shell_protocol::{Command, Notification, Response, StreamEvent};
use shell_ui::{Notice, UiEvent, UiRuntime};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::commands::{parse_slash_command, SlashCommand, HELP_TEXT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Runs until `/quit`, or until input ends and no turn is left running.
pub async fn run<R, W>(runtime: &mut UiRuntime, input: R, out: &mut W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut queued: VecDeque<String> = VecDeque::new();
    let mut input_open = true;
    let mut abort_sent = false;

    loop {
        while ready_for_input(runtime) {
            let Some(line) = queued.pop_front() else {
                break;
            };
            if handle_line(runtime, &line, out).await? == Flow::Quit {
                return quit(runtime);
            }
        }

        if !input_open && queued.is_empty() {
            if !runtime.store().is_streaming() {
                return Ok(());
            }
            if !abort_sent && !runtime.store().awaiting_decisions().is_empty() {
                writeln!(out, "[input closed; aborting turn]")?;
                report(runtime.abort(), out)?;
                abort_sent = true;
            }
        }

        let next = tokio::select! {
            line = lines.next_line(), if input_open => Input::Line(line?),
            event = runtime.pump_once() => Input::Event(event),
        };

        match next {
            Input::Line(Some(line)) if line.trim().is_empty() => {}
            Input::Line(Some(line)) => {
                let immediate = parse_slash_command(&line)
                    .is_some_and(|command| command.is_immediate());
                if !immediate {
                    queued.push_back(line);
                } else if handle_line(runtime, &line, out).await? == Flow::Quit {
                    return quit(runtime);
                }
            }
            Input::Line(None) => input_open = false,
            Input::Event(Some(event)) => render(runtime, &event, out)?,
            Input::Event(None) => return Ok(()),
        }
        out.flush()?;
    }
}

enum Input {
    Line(Option<String>),
    Event(Option<UiEvent>),
}

fn ready_for_input(runtime: &UiRuntime) -> bool {
    let store = runtime.store();
    !store.is_streaming() || !store.awaiting_decisions().is_empty()
}

fn quit(runtime: &mut UiRuntime) -> io::Result<()> {
    if runtime.store().is_streaming() {
        let _ = runtime.abort();
    }
    Ok(())
}

async fn handle_line<W: Write>(
    runtime: &mut UiRuntime,
    line: &str,
    out: &mut W,
) -> io::Result<Flow> {
    let Some(command) = parse_slash_command(line) else {
        match runtime.send_message(line) {
            Ok(prompt_id) => tracing::debug!(prompt_id = %prompt_id, "message sent"),
            Err(error) => writeln!(out, "error: {error}")?,
        }
        return Ok(Flow::Continue);
    };

    match command {
        SlashCommand::Approve(call_id) => report(runtime.approve(&call_id), out)?,
        SlashCommand::Reject { call_id, reason } => {
            report(runtime.reject(&call_id, reason), out)?;
        }
        SlashCommand::ApproveAll => match runtime.approve_all() {
            Ok(count) => writeln!(out, "[approved {count} tool call(s)]")?,
            Err(error) => writeln!(out, "error: {error}")?,
        },
        SlashCommand::RejectAll { reason } => match runtime.reject_all(reason) {
            Ok(count) => writeln!(out, "[rejected {count} tool call(s)]")?,
            Err(error) => writeln!(out, "error: {error}")?,
        },
        SlashCommand::Abort => report(runtime.abort(), out)?,
        SlashCommand::Clear => {
            runtime.clear_messages();
            match runtime.commands().invoke(Command::Reset).await {
                Ok(_) => writeln!(out, "[conversation cleared]")?,
                Err(error) => writeln!(out, "error: {error}")?,
            }
        }
        SlashCommand::History => match runtime.commands().invoke(Command::GetHistory).await {
            Ok(Response::History(entries)) => {
                writeln!(out, "[history: {} entries]", entries.len())?;
                for entry in entries {
                    writeln!(out, "{entry}")?;
                }
            }
            Ok(other) => writeln!(out, "error: unexpected reply {other:?}")?,
            Err(error) => writeln!(out, "error: {error}")?,
        },
        SlashCommand::Settings => match runtime.commands().invoke(Command::GetSettings).await {
            Ok(Response::Settings(Some(settings))) => writeln!(
                out,
                "[settings] model={} approval_mode={} target_dir={}",
                settings.model,
                settings.approval_mode,
                settings.target_dir.display()
            )?,
            Ok(Response::Settings(None)) => writeln!(out, "[settings] not initialized")?,
            Ok(other) => writeln!(out, "error: unexpected reply {other:?}")?,
            Err(error) => writeln!(out, "error: {error}")?,
        },
        SlashCommand::Help => writeln!(out, "{HELP_TEXT}")?,
        SlashCommand::Quit => return Ok(Flow::Quit),
        SlashCommand::Usage(usage) => writeln!(out, "usage: {usage}")?,
        SlashCommand::Unknown(command) => writeln!(out, "Unknown command: {command}")?,
    }

    Ok(Flow::Continue)
}

fn report<W: Write, E: std::fmt::Display>(result: Result<(), E>, out: &mut W) -> io::Result<()> {
    if let Err(error) = result {
        writeln!(out, "error: {error}")?;
    }
    Ok(())
}

fn render<W: Write>(runtime: &mut UiRuntime, event: &UiEvent, out: &mut W) -> io::Result<()> {
    match event {
        UiEvent::Notification(Notification::StreamEvent(event)) => match event {
            StreamEvent::Content(text) => write!(out, "{text}")?,
            StreamEvent::ToolCallRequest(request) => writeln!(
                out,
                "[tool {}] {} {}",
                request.call_id,
                request.name,
                request.args
            )?,
            StreamEvent::ToolCallResponse(response) => match &response.error {
                Some(error) => writeln!(out, "[tool {}] failed: {error}", response.call_id)?,
                None => writeln!(out, "[tool {}] done", response.call_id)?,
            },
            StreamEvent::Finished(_) => {}
            StreamEvent::Error(info) => writeln!(out, "error: {}", info.error)?,
            StreamEvent::UserCancelled => writeln!(out, "[cancelled]")?,
        },
        UiEvent::Notification(Notification::ConfirmationRequest(request)) => writeln!(
            out,
            "[approval needed] {}: {} {} (/approve {} or /reject {})",
            request.correlation_id,
            request.tool_call.name,
            request.tool_call.args,
            request.correlation_id,
            request.correlation_id
        )?,
        UiEvent::Notification(_) => {}
        UiEvent::CommandResult { .. } | UiEvent::Disconnected => {}
    }

    for notice in runtime.take_notices() {
        match notice {
            Notice::StreamFinished { .. } => writeln!(out)?,
            Notice::Disconnected => writeln!(out, "[host disconnected]")?,
            Notice::CommandFailed { channel, message } => {
                writeln!(out, "error: {channel}: {message}")?;
            }
            Notice::TurnFailed { .. } | Notice::TurnCancelled => {}
        }
    }
    Ok(())
}
