use pretty_assertions::assert_eq;
use serde_json::json;
use shell_protocol::channel::{command_channel, notification_channel};
use shell_protocol::wire::{
    connect_frames, encode_frame, serve_frames, Frame, FrameDecoder, WireError,
};
use shell_protocol::{
    Command, CommandError, Notification, Response, SendResult, StreamEvent, ToolCallRequest,
};

fn send_request(id: u64) -> Frame {
    Frame::Request {
        id,
        command: Command::Send {
            message: "list files".to_string(),
            prompt_id: format!("p-{id}"),
        },
    }
}

#[test]
fn encoded_frames_are_single_lines() {
    let line = encode_frame(&send_request(1)).expect("encode");
    assert!(line.ends_with('\n'));
    assert_eq!(line.matches('\n').count(), 1);
}

#[test]
fn decoder_reassembles_frames_split_across_reads() {
    let first = encode_frame(&send_request(1)).expect("encode");
    let second = encode_frame(&Frame::Notify {
        notification: Notification::from(StreamEvent::ToolCallRequest(ToolCallRequest::new(
            "c1",
            "list_directory",
            json!({ "path": "." }),
        ))),
    })
    .expect("encode");
    let joined = format!("{first}{second}");
    let (head, tail) = joined.as_bytes().split_at(first.len() + 7);

    let mut decoder = FrameDecoder::default();
    let frames = decoder.feed(head);
    assert_eq!(frames.len(), 1);
    assert!(!decoder.is_empty_buffer());

    let frames = decoder.feed(tail);
    assert_eq!(frames.len(), 1);
    assert!(decoder.is_empty_buffer());
    assert!(matches!(
        frames.into_iter().next().expect("frame").expect("valid"),
        Frame::Notify {
            notification: Notification::StreamEvent(StreamEvent::ToolCallRequest(_))
        }
    ));
}

#[test]
fn decoder_skips_blank_lines_and_isolates_malformed_ones() {
    let valid = encode_frame(&send_request(2)).expect("encode");
    let input = format!("\n{{not json}}\n\n{valid}");

    let mut decoder = FrameDecoder::default();
    let frames = decoder.feed(input.as_bytes());

    assert_eq!(frames.len(), 2);
    assert!(matches!(frames[0], Err(WireError::Decode { .. })));
    assert_eq!(
        frames[1].as_ref().expect("second frame decodes"),
        &send_request(2)
    );
}

#[test]
fn response_frames_carry_both_success_and_failure() {
    let ok = Frame::Response {
        id: 3,
        result: Ok(Response::Sent(SendResult::aborted())),
    };
    let err = Frame::Response {
        id: 4,
        result: Err(CommandError::new(
            "No confirmation callback found for tool call: c9",
        )),
    };

    let input = format!(
        "{}{}",
        encode_frame(&ok).expect("encode"),
        encode_frame(&err).expect("encode")
    );
    let frames: Vec<Frame> = FrameDecoder::default()
        .feed(input.as_bytes())
        .into_iter()
        .map(|frame| frame.expect("valid frame"))
        .collect();

    assert_eq!(frames, vec![ok, err]);
}

#[test]
fn request_frame_wire_shape_is_stable() {
    let encoded = serde_json::to_value(Frame::Request {
        id: 9,
        command: Command::Abort,
    })
    .expect("serialize");

    assert_eq!(
        encoded,
        json!({ "frame": "request", "id": 9, "command": { "channel": "gemini:abort" } })
    );
}

#[test]
fn post_frame_wire_shape_is_stable() {
    let encoded = serde_json::to_value(Frame::Post {
        command: Command::Abort,
    })
    .expect("serialize");

    assert_eq!(
        encoded,
        json!({ "frame": "post", "command": { "channel": "gemini:abort" } })
    );
}

#[tokio::test]
async fn frame_pipe_delivers_stream_events_before_the_reply_they_precede() {
    let (ui_io, host_io) = tokio::io::duplex(256);
    let (ui_read, ui_write) = tokio::io::split(ui_io);
    let (host_read, host_write) = tokio::io::split(host_io);

    let (host_commands, mut host_inbox) = command_channel();
    let (host_notify, host_notifications) = notification_channel();
    let server = tokio::spawn(serve_frames(
        host_read,
        host_write,
        host_commands,
        host_notifications,
    ));

    let (commands, command_rx) = command_channel();
    let (notify, mut notifications) = notification_channel();
    let client = tokio::spawn(connect_frames(ui_read, ui_write, command_rx, notify));

    let host = tokio::spawn(async move {
        let mut posted = Vec::new();
        while let Some(envelope) = host_inbox.recv().await {
            match &envelope.command {
                Command::Send { message, .. } => {
                    let _ = host_notify.send(StreamEvent::content(message.clone()).into());
                    let _ = host_notify.send(StreamEvent::finished("STOP").into());
                    envelope.respond(Ok(Response::Sent(SendResult::completed())));
                }
                Command::Abort => {
                    assert!(envelope.reply.is_none());
                    posted.push(Command::Abort);
                }
                _ => envelope.respond(Err(CommandError::new("unsupported"))),
            }
        }
        posted
    });

    let sent = commands
        .invoke(Command::Send {
            message: "hello".to_string(),
            prompt_id: "p-1".to_string(),
        })
        .await;
    assert_eq!(sent, Ok(Response::Sent(SendResult::completed())));
    assert_eq!(
        notifications.try_recv().expect("content before reply"),
        Notification::from(StreamEvent::content("hello"))
    );
    assert_eq!(
        notifications.try_recv().expect("finished before reply"),
        Notification::from(StreamEvent::finished("STOP"))
    );

    commands.post(Command::Abort).expect("post abort");
    assert_eq!(
        commands.invoke(Command::Reset).await,
        Err(CommandError::new("unsupported"))
    );

    drop(commands);
    assert_eq!(host.await.expect("host task"), vec![Command::Abort]);
    server.await.expect("server task").expect("host end closes cleanly");
    client.await.expect("client task").expect("UI end closes cleanly");
    assert!(notifications.recv().await.is_none());
}

#[tokio::test]
async fn requests_fail_as_disconnected_when_the_host_end_is_gone() {
    let (ui_io, host_io) = tokio::io::duplex(256);
    drop(host_io);
    let (ui_read, ui_write) = tokio::io::split(ui_io);

    let (commands, command_rx) = command_channel();
    let (notify, mut notifications) = notification_channel();
    let client = tokio::spawn(connect_frames(ui_read, ui_write, command_rx, notify));

    assert_eq!(
        commands.invoke(Command::Reset).await,
        Err(CommandError::disconnected())
    );
    let _ = client.await.expect("client task");
    assert!(notifications.recv().await.is_none());
}

