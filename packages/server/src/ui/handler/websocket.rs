//! WebSocket connection handler.
//!
//! Each connection runs two tasks: a pusher loop draining the outbound
//! command channel into the socket, and a receive loop feeding inbound
//! frames to the router. When either side ends, the other is aborted and
//! disconnect cleanup runs for whatever identity the connection held.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::infrastructure::OutboundCommand;
use crate::infrastructure::dto::websocket::ServerEvent;
use crate::ui::router::{ConnectionContext, dispatch};
use crate::ui::state::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drain outbound commands into the socket until the channel closes or a
/// close command arrives.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<OutboundCommand>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            match command {
                OutboundCommand::Event(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                OutboundCommand::Ping => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                OutboundCommand::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = Uuid::new_v4();
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    tracing::info!("Connection {} established", connection_id);
    let established = ServerEvent::ConnectionEstablished { connection_id };
    if tx.send(OutboundCommand::Event(established.to_json())).is_err() {
        return;
    }

    let mut send_task = pusher_loop(rx, sender);

    let recv_state = state.clone();
    let recv_tx = tx.clone();
    // The identity is shared with the cleanup below, which must run even
    // when the receive task is aborted mid-frame.
    let identity = Arc::new(std::sync::Mutex::new(None));
    let recv_identity = identity.clone();

    let mut recv_task = tokio::spawn(async move {
        let mut ctx = ConnectionContext::new(connection_id, recv_tx.clone());
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::debug!("Connection {} transport error: {}", connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    // Any inbound traffic proves liveness.
                    if let Some(user_id) = &ctx.user_id {
                        recv_state.registry.confirm(user_id).await;
                    }
                    if let Err(e) = dispatch(&recv_state, &mut ctx, &text).await {
                        tracing::debug!("Connection {} request failed: {}", connection_id, e);
                        let event = ServerEvent::Error {
                            code: e.code().to_string(),
                            message: e.to_string(),
                        };
                        if recv_tx.send(OutboundCommand::Event(event.to_json())).is_err() {
                            break;
                        }
                    }
                    *recv_identity.lock().unwrap() = ctx.user_id.clone();
                }
                Message::Pong(_) => {
                    if let Some(user_id) = &ctx.user_id {
                        recv_state.registry.confirm(user_id).await;
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Connection {} closed by client", connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    let user_id = identity.lock().unwrap().clone();
    match user_id {
        Some(user_id) => {
            state.disconnect_usecase.execute(&user_id, connection_id).await;
        }
        None => {
            tracing::info!("Connection {} closed before authentication", connection_id);
        }
    }
}
