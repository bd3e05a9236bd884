use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};
use uuid::Uuid;

use crate::hub::protocol;
use crate::state::AppState;

/// Ping interval: server sends a WebSocket ping every 30 seconds so abrupt
/// client disconnects cannot leak registry entries.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if no pong arrives within 10 seconds of a ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on one socket write. A recipient whose transport has stalled
/// is treated as failed and torn down instead of holding the writer task.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity resolved for a connection before the actor starts.
#[derive(Debug, Clone)]
pub struct ConnectionIdentity {
    pub user_id: Option<i64>,
    pub role: String,
    pub is_authenticated: bool,
}

impl ConnectionIdentity {
    pub fn authenticated(user_id: i64, role: String) -> Self {
        Self {
            user_id: Some(user_id),
            role,
            is_authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            role: "Anonymous".to_string(),
            is_authenticated: false,
        }
    }
}

/// Run the actor-per-connection pattern for one WebSocket.
///
/// Splits the socket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader loop: processes incoming frames, dispatches client commands
///
/// The mpsc sender is what the registry hands to the dispatcher, so any part
/// of the system can push to this client without touching the socket.
pub async fn run_connection(socket: WebSocket, state: AppState, identity: ConnectionIdentity) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let connection_id = Uuid::new_v4().to_string();
    state.registry.connect(
        &connection_id,
        tx.clone(),
        identity.user_id,
        &identity.role,
        identity.is_authenticated,
    );

    tracing::info!(
        connection_id = %connection_id,
        user_id = ?identity.user_id,
        role = %identity.role,
        "WebSocket actor started"
    );

    // Spawn writer task: forwards mpsc messages to the WebSocket sink.
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception.
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses.
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick.
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone.
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue.
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket frames.
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_client_command(
                        text.as_str(),
                        &connection_id,
                        &tx,
                        &state.registry,
                    );
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "Binary frame ignored (protocol is JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        connection_id = %connection_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(connection_id = %connection_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks, then remove the connection and
    // all its group memberships in one step.
    writer_handle.abort();
    ping_handle.abort();
    state.registry.disconnect(&connection_id);

    tracing::info!(
        connection_id = %connection_id,
        user_id = ?identity.user_id,
        "WebSocket actor stopped"
    );
}

/// Writer task: receives messages from the mpsc channel and forwards them to
/// the WebSocket sink. Each write is bounded; a stalled transport fails only
/// this connection.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        match timeout(WRITE_TIMEOUT, ws_sender.send(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                // WebSocket send failed — connection is broken.
                break;
            }
            Err(_) => {
                tracing::warn!("Socket write stalled past timeout, dropping connection");
                break;
            }
        }
    }
}
