//! Newline-delimited JSON framing for running the UI and host in separate
//! processes.
//!
//! [`serve_frames`] is the host end of a pipe and [`connect_frames`] the UI
//! end. Each bridges the in-process [`channel`](crate::channel) types to a
//! byte stream, so either side can keep using [`CommandSender`] and
//! [`NotificationReceiver`] unchanged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::channel::{CommandEnvelope, CommandReceiver, CommandSender, Reply};
use crate::channel::{NotificationReceiver, NotificationSender};
use crate::{Command, CommandError, Notification, Response};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    Request {
        id: u64,
        command: Command,
    },
    Response {
        id: u64,
        result: Result<Response, CommandError>,
    },
    /// Command that expects no reply.
    Post {
        command: Command,
    },
    Notify {
        notification: Notification,
    },
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed frame `{line}`: {source}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("frame pipe I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Encodes one frame as a single JSON line terminated by `\n`.
pub fn encode_frame(frame: &Frame) -> Result<String, WireError> {
    let mut line = serde_json::to_string(frame).map_err(WireError::Encode)?;
    line.push('\n');
    Ok(line)
}

/// Incremental decoder for newline-delimited frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Feed arbitrary bytes and drain every complete frame.
    ///
    /// Blank lines are skipped. A malformed line yields an error in its slot
    /// and does not poison the lines after it.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<Frame, WireError>> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            frames.push(
                serde_json::from_str::<Frame>(line).map_err(|source| WireError::Decode {
                    line: line.to_string(),
                    source,
                }),
            );
        }

        frames
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(encode_frame(frame)?.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

enum HostStep {
    Notify(Option<Notification>),
    Reply(Option<Frame>),
    Read(usize),
}

/// Host end of a frame pipe.
///
/// Requests read from `reader` are issued on `commands`; their replies and
/// every notification are written to `writer`. Notifications queued before a
/// reply is ready are written first, so the peer never sees a reply ahead of
/// the events it caused. Returns after `reader` closes, every reply is
/// written and the notification queue is closed.
pub async fn serve_frames<R, W>(
    mut reader: R,
    mut writer: W,
    commands: CommandSender,
    mut notifications: NotificationReceiver,
) -> Result<(), WireError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (replies_tx, mut replies) = mpsc::unbounded_channel::<Frame>();
    let mut commands = Some(commands);
    let mut replies_tx = Some(replies_tx);
    let mut notifications_open = true;
    let mut replies_open = true;
    let mut decoder = FrameDecoder::default();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let step = tokio::select! {
            biased;
            notification = notifications.recv(), if notifications_open => {
                HostStep::Notify(notification)
            }
            reply = replies.recv(), if replies_open => HostStep::Reply(reply),
            read = reader.read(&mut buf), if commands.is_some() => HostStep::Read(read?),
            else => break,
        };

        match step {
            HostStep::Notify(Some(notification)) => {
                write_frame(&mut writer, &Frame::Notify { notification }).await?;
            }
            HostStep::Notify(None) => notifications_open = false,
            HostStep::Reply(Some(frame)) => write_frame(&mut writer, &frame).await?,
            HostStep::Reply(None) => replies_open = false,
            HostStep::Read(0) => {
                tracing::debug!("frame pipe closed by the UI");
                commands = None;
                replies_tx = None;
            }
            HostStep::Read(read) => {
                let (Some(commands), Some(replies_tx)) = (commands.as_ref(), replies_tx.as_ref())
                else {
                    continue;
                };
                for frame in decoder.feed(&buf[..read]) {
                    match frame {
                        Ok(Frame::Request { id, command }) => {
                            let commands = commands.clone();
                            let replies = replies_tx.clone();
                            tokio::spawn(async move {
                                let result = commands.invoke(command).await;
                                let _ = replies.send(Frame::Response { id, result });
                            });
                        }
                        Ok(Frame::Post { command }) => {
                            let _ = commands.post(command);
                        }
                        Ok(other) => {
                            tracing::warn!(?other, "unexpected frame from the UI");
                        }
                        Err(error) => tracing::warn!(%error, "dropping malformed frame"),
                    }
                }
            }
        }
    }

    writer.shutdown().await?;
    Ok(())
}

enum PeerStep {
    Command(Option<CommandEnvelope>),
    Read(usize),
}

/// UI end of a frame pipe.
///
/// Commands from `commands` are written to `writer`. Frames read from
/// `reader` are routed in arrival order: replies to their issuers and
/// notifications into `notifications`. Once `reader` closes, issuers still
/// waiting see a disconnect and the notification queue closes.
pub async fn connect_frames<R, W>(
    mut reader: R,
    mut writer: W,
    mut commands: CommandReceiver,
    notifications: NotificationSender,
) -> Result<(), WireError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut pending: HashMap<u64, Reply> = HashMap::new();
    let mut next_id = 0u64;
    let mut commands_open = true;
    let mut decoder = FrameDecoder::default();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let step = tokio::select! {
            read = reader.read(&mut buf) => PeerStep::Read(read?),
            envelope = commands.recv(), if commands_open => PeerStep::Command(envelope),
        };

        match step {
            PeerStep::Command(Some(envelope)) => {
                let frame = match envelope.reply {
                    Some(reply) => {
                        next_id += 1;
                        pending.insert(next_id, reply);
                        Frame::Request {
                            id: next_id,
                            command: envelope.command,
                        }
                    }
                    None => Frame::Post {
                        command: envelope.command,
                    },
                };
                write_frame(&mut writer, &frame).await?;
            }
            PeerStep::Command(None) => {
                commands_open = false;
                writer.shutdown().await?;
            }
            PeerStep::Read(0) => break,
            PeerStep::Read(read) => {
                for frame in decoder.feed(&buf[..read]) {
                    match frame {
                        Ok(Frame::Response { id, result }) => match pending.remove(&id) {
                            Some(reply) => {
                                let _ = reply.send(result);
                            }
                            None => tracing::warn!(id, "reply for an unknown request"),
                        },
                        Ok(Frame::Notify { notification }) => {
                            let _ = notifications.send(notification);
                        }
                        Ok(other) => tracing::warn!(?other, "unexpected frame from the host"),
                        Err(error) => tracing::warn!(%error, "dropping malformed frame"),
                    }
                }
            }
        }
    }

    if !pending.is_empty() {
        tracing::warn!(pending = pending.len(), "host closed the pipe with requests in flight");
    }
    Ok(())
}

