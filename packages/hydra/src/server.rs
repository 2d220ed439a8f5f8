//! WebSocket fanout server: one inbound `execute` frame re-enters the
//! Dispatcher exactly like the terminal's stdin path; every resulting
//! DECISION is broadcast to subscribers on the `actions` channel, and on
//! `decisions` too when the decision isn't `ALLOW`.

use crate::app::App;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use hydra_dispatcher::Command;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const IDLE_MULTIPLIER: u32 = 3;
const DEFAULT_MAX_CLIENTS: usize = 100;
const BROADCAST_CAPACITY: usize = 256;

const CHANNELS: &[&str] = &["actions", "decisions", "heads", "limbs", "workflows", "consensus", "spectral", "broadcast", "all"];

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Execute { command: Command },
    Ping,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Welcome { channels: &'static [&'static str] },
    StateChange { channel: String, payload: serde_json::Value },
    Pong,
    Error { message: String },
}

struct ServerState {
    app: Arc<App>,
    broadcast: broadcast::Sender<ServerMessage>,
    client_count: AtomicUsize,
    max_clients: usize,
}

pub async fn run(app: Arc<App>, port: u16) -> std::io::Result<()> {
    let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
    let state = Arc::new(ServerState {
        app,
        broadcast: tx,
        client_count: AtomicUsize::new(0),
        max_clients: DEFAULT_MAX_CLIENTS,
    });

    let router = Router::new()
        .route("/ws", get(upgrade))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr, "hydra websocket server listening");
    axum::serve(listener, router).await
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    if state.client_count.fetch_add(1, Ordering::SeqCst) >= state.max_clients {
        state.client_count.fetch_sub(1, Ordering::SeqCst);
        let (mut sender, _receiver) = socket.split();
        let _ = send(&mut sender, &ServerMessage::Error { message: "at capacity".to_string() }).await;
        tracing::warn!("rejected websocket connection: at capacity");
        return;
    }

    let (mut sender, mut receiver) = socket.split();
    let mut subscribed: Vec<String> = Vec::new();
    let mut downstream = state.broadcast.subscribe();

    let welcome = ServerMessage::Welcome { channels: CHANNELS };
    if send(&mut sender, &welcome).await.is_err() {
        state.client_count.fetch_sub(1, Ordering::SeqCst);
        return;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    let mut silence_ticks: u32 = 0;

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        silence_ticks = 0;
                        handle_client_message(&text, &state, &mut sender, &mut subscribed).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => silence_ticks = 0,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "websocket receive error");
                        break;
                    }
                }
            }
            event = downstream.recv() => {
                match event {
                    Ok(message) => {
                        if should_deliver(&message, &subscribed) && send(&mut sender, &message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = heartbeat.tick() => {
                silence_ticks += 1;
                if silence_ticks >= IDLE_MULTIPLIER {
                    tracing::debug!("client idle, closing");
                    break;
                }
                if send(&mut sender, &ServerMessage::Pong).await.is_err() {
                    break;
                }
            }
        }
    }

    state.client_count.fetch_sub(1, Ordering::SeqCst);
}

async fn handle_client_message(
    text: &str,
    state: &Arc<ServerState>,
    sender: &mut SplitSink<WebSocket, Message>,
    subscribed: &mut Vec<String>,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { channel }) => {
            if !subscribed.contains(&channel) {
                subscribed.push(channel);
            }
        }
        Ok(ClientMessage::Unsubscribe { channel }) => {
            subscribed.retain(|c| c != &channel);
        }
        Ok(ClientMessage::Ping) => {
            let _ = send(sender, &ServerMessage::Pong).await;
        }
        Ok(ClientMessage::Execute { command }) => {
            let result = state.app.dispatcher.execute(command).await;
            let payload = serde_json::to_value(&result).unwrap_or_default();
            let decision = result.decision.clone();

            let _ = state.broadcast.send(ServerMessage::StateChange {
                channel: "actions".to_string(),
                payload: payload.clone(),
            });
            if decision != "ALLOW" {
                let _ = state.broadcast.send(ServerMessage::StateChange {
                    channel: "decisions".to_string(),
                    payload,
                });
            }
        }
        Err(e) => {
            let _ = send(sender, &ServerMessage::Error { message: e.to_string() }).await;
        }
    }
}

fn should_deliver(message: &ServerMessage, subscribed: &[String]) -> bool {
    match message {
        ServerMessage::StateChange { channel, .. } => {
            subscribed.iter().any(|c| c == channel || c == "all" || c == "broadcast")
        }
        _ => true,
    }
}

async fn send(sender: &mut SplitSink<WebSocket, Message>, message: &ServerMessage) -> Result<(), ()> {
    let text = serde_json::to_string(message).map_err(|_| ())?;
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}
