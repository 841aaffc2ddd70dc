//! WebSocket Connection Handler
//!
//! Upgrades requests on any path and runs the per-connection loop: one
//! writer task drains the session's frame queue into the socket while the
//! reader feeds inbound payloads to the connection service one at a time.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        OriginalUri, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::application::services::ConnectionService;
use crate::domain::Frame;
use crate::shared::error::BrokerError;
use crate::startup::AppState;

/// Body served to plain HTTP requests
pub const BANNER: &str = "Resource Broker WebSocketServer";

/// WebSocket upgrade handler, falling back to the banner for plain requests
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    OriginalUri(uri): OriginalUri,
    State(state): State<AppState>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(_) => return BANNER.into_response(),
    };

    let path = uri.path().to_string();
    let limits = &state.settings.websocket;
    ws.max_message_size(limits.max_message_size)
        .max_frame_size(limits.max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, path, state.service))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, path: String, service: Arc<ConnectionService>) {
    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    // Bounded channel for outgoing messages
    let (tx, mut rx) = mpsc::channel::<Frame>(service.settings().websocket.send_queue_capacity);
    let session = service.connect(&path, tx);
    let connection_id = session.id();

    // Spawn task to forward messages from channel to WebSocket
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.as_ref().into())).await.is_err() {
                break;
            }
        }
    });

    // Main message loop
    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        service.on_message(&session, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => service.on_message(&session, text).await,
                        Err(_) => service.report(&BrokerError::MalformedMessage {
                            connection: connection_id,
                            raw: String::from_utf8_lossy(&bytes).into_owned(),
                        }),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %connection_id, "Connection closed");
                        break;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Pong is handled automatically by axum
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            _ = session.terminated() => {
                tracing::debug!(connection_id = %connection_id, "Connection terminated by server");
                break;
            }
        }
    }

    // Cleanup
    service.disconnect(connection_id);
    sender_task.abort();
}
