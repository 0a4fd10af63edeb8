use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::auth::identity::{identity_from_headers, Identity};
use crate::hub::signaling::SignalKind;
use crate::hub::AppState;
use crate::models::{
    ClientMessage, CodeOutputMessage, ExecutionNotificationMessage, PasteNotificationMessage,
    ServerMessage,
};

/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    app_state: State<Arc<AppState>>,
) -> Response {
    info!("New WebSocket connection attempt");
    let identity = identity_from_headers(&headers);
    ws.on_upgrade(move |socket| handle_socket(socket, identity, app_state.0))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, identity: Option<Identity>, app_state: Arc<AppState>) {
    // Generate unique connection ID to identify this client
    let connection_id = Uuid::new_v4().to_string();
    info!(connection_id, "WebSocket connection established");

    // Split the socket into sender and receiver
    let (mut sender, mut receiver) = socket.split();

    // Outbound queue: everything addressed to this connection funnels through
    // one channel, so the socket has a single writer.
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServerMessage>();
    app_state.broadcast.attach(&connection_id, tx);

    // Writer task: drain the outbound queue into the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize outbound message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Reader task: parse and dispatch incoming messages. Execution requests
    // run in a JoinSet owned by this task, so dropping it on disconnect
    // aborts any still-running submissions.
    let state = app_state.clone();
    let conn = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut exec_tasks = JoinSet::new();
        loop {
            match classify_frame(receiver.next().await, &conn) {
                Inbound::Event(msg) => {
                    handle_client_message(&state, &conn, identity.as_ref(), msg, &mut exec_tasks)
                        .await;
                }
                Inbound::Skip => continue,
                Inbound::Closed => break,
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    // Leave whatever room the connection occupied, then drop its queue
    if let Some(room_id) = app_state.presence.lookup(&connection_id) {
        app_state.registry.leave(&room_id, &connection_id).await;
    }
    app_state.broadcast.detach(&connection_id);
    info!(connection_id, "WebSocket connection terminated");
}

/// Disposition of one inbound socket frame.
#[derive(Debug)]
enum Inbound {
    Event(ClientMessage),
    Skip,
    Closed,
}

/// Only text frames carry hub events; control and binary frames are skipped
/// rather than ending the session. The transport closing (or erroring) does.
fn classify_frame(frame: Option<Result<Message, axum::Error>>, connection_id: &str) -> Inbound {
    match frame {
        Some(Ok(Message::Text(raw))) => match serde_json::from_str(&raw) {
            Ok(msg) => Inbound::Event(msg),
            Err(e) => {
                error!(connection_id, "Failed to parse message: {}", e);
                Inbound::Skip
            }
        },
        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => Inbound::Closed,
        Some(Ok(_)) => Inbound::Skip,
    }
}

async fn handle_client_message(
    state: &Arc<AppState>,
    connection_id: &str,
    identity: Option<&Identity>,
    msg: ClientMessage,
    exec_tasks: &mut JoinSet<()>,
) {
    match msg {
        ClientMessage::JoinRoom(m) => {
            let user_id = identity.map(|i| i.user_id.clone());
            let snapshot = state
                .registry
                .join(&m.room_id, connection_id, &m.display_name, user_id)
                .await;
            state
                .broadcast
                .send_to(connection_id, ServerMessage::InitialSync(snapshot));
        }
        ClientMessage::FileAdd(m) => {
            let Some(room_id) = state.presence.lookup(connection_id) else {
                debug!(connection_id, "file-add before join ignored");
                return;
            };
            state.registry.add_file(&room_id, &m.path).await;
        }
        ClientMessage::FileRename(m) => {
            let Some(room_id) = state.presence.lookup(connection_id) else {
                debug!(connection_id, "file-rename before join ignored");
                return;
            };
            state
                .registry
                .rename_file(&room_id, &m.old_path, &m.new_path)
                .await;
        }
        ClientMessage::FileDelete(m) => {
            let Some(room_id) = state.presence.lookup(connection_id) else {
                debug!(connection_id, "file-delete before join ignored");
                return;
            };
            state.registry.delete_file(&room_id, &m.path).await;
        }
        ClientMessage::CodeChange(m) => {
            let Some(room_id) = state.presence.lookup(connection_id) else {
                debug!(connection_id, "code-change before join ignored");
                return;
            };
            state
                .registry
                .set_file_content(&room_id, &m.path, &m.content, connection_id)
                .await;
        }
        ClientMessage::RunCode(m) => {
            let Some(room_id) = state.presence.lookup(connection_id) else {
                debug!(connection_id, "run-code before join ignored");
                return;
            };
            let username = state
                .presence
                .participant(connection_id)
                .map(|p| p.username)
                .unwrap_or_default();

            // The room hears about the run attempt even when the request is
            // later rejected as invalid.
            state.broadcast.publish(
                &room_id,
                ServerMessage::ExecutionNotification(ExecutionNotificationMessage {
                    username,
                    file: m.current_file.clone(),
                }),
                Some(connection_id),
            );

            let dispatcher = state.dispatcher.clone();
            let broadcast = state.broadcast.clone();
            let requester = connection_id.to_string();
            exec_tasks.spawn(async move {
                let output = match dispatcher
                    .run(&m.language, &m.code, m.stdin.as_deref())
                    .await
                {
                    Ok(outcome) => CodeOutputMessage {
                        stdout: outcome.stdout,
                        stderr: outcome.stderr,
                        status: outcome.status,
                    },
                    Err(err) => CodeOutputMessage {
                        stdout: String::new(),
                        stderr: Some(err.to_string()),
                        status: "Error".to_string(),
                    },
                };
                // Unicast: the result follows the requester, not the room
                broadcast.send_to(&requester, ServerMessage::CodeOutput(output));
            });
        }
        ClientMessage::SendChat(m) => {
            let Some(room_id) = state.presence.lookup(connection_id) else {
                debug!(connection_id, "chat before join ignored");
                return;
            };
            state.registry.append_chat(&room_id, connection_id, &m.text).await;
        }
        ClientMessage::LargePasteNotice => {
            let Some(room_id) = state.presence.lookup(connection_id) else {
                debug!(connection_id, "paste notice before join ignored");
                return;
            };
            let username = state
                .presence
                .participant(connection_id)
                .map(|p| p.username)
                .unwrap_or_default();
            state.broadcast.publish(
                &room_id,
                ServerMessage::PasteNotification(PasteNotificationMessage { username }),
                Some(connection_id),
            );
        }
        ClientMessage::WebrtcOffer(m) => {
            state.relay.relay(SignalKind::Offer, connection_id, &m.to, m.payload);
        }
        ClientMessage::WebrtcAnswer(m) => {
            state.relay.relay(SignalKind::Answer, connection_id, &m.to, m.payload);
        }
        ClientMessage::WebrtcIceCandidate(m) => {
            state
                .relay
                .relay(SignalKind::IceCandidate, connection_id, &m.to, m.payload);
        }
    }
}
