//! WebSocket support for live run updates and human input.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use tatkal_core::{validate_input, BookingEvent, EventEnvelope, InputKind, RunRegistry};

use crate::metrics::{
    WS_COMMANDS_RECEIVED, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS,
    WS_MESSAGES_SENT,
};
use crate::state::AppState;

/// Message sent to a single client in answer to one of its commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsReply {
    Pong {
        timestamp: i64,
    },
    /// Outcome of a captcha or OTP response.
    InputResult {
        kind: InputKind,
        accepted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
    },
    StopResult {
        #[serde(skip_serializing_if = "Option::is_none")]
        run_id: Option<String>,
        stopped: bool,
    },
    Error {
        message: String,
    },
}

impl WsReply {
    fn type_name(&self) -> &'static str {
        match self {
            WsReply::Pong { .. } => "pong",
            WsReply::InputResult { .. } => "input_result",
            WsReply::StopResult { .. } => "stop_result",
            WsReply::Error { .. } => "error",
        }
    }
}

/// Commands accepted from clients.
///
/// Without a `run_id`, input goes to whichever run is waiting for that kind
/// and `stop` stops every active run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CaptchaResponse {
        #[serde(default)]
        run_id: Option<String>,
        value: String,
    },
    OtpResponse {
        #[serde(default)]
        run_id: Option<String>,
        value: String,
    },
    Stop {
        #[serde(default)]
        run_id: Option<String>,
    },
    Ping,
}

impl ClientMessage {
    fn type_name(&self) -> &'static str {
        match self {
            ClientMessage::CaptchaResponse { .. } => "captcha_response",
            ClientMessage::OtpResponse { .. } => "otp_response",
            ClientMessage::Stop { .. } => "stop",
            ClientMessage::Ping => "ping",
        }
    }
}

/// Broadcaster for booking events using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<BookingEvent>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: BookingEvent) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.sender.subscribe()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Drain the engine's event bus into the broadcaster until every emitter is gone.
pub async fn forward_events(mut rx: mpsc::Receiver<EventEnvelope>, broadcaster: WsBroadcaster) {
    while let Some(envelope) = rx.recv().await {
        debug!(
            "Forwarding {} event emitted at {}",
            envelope.event.event_type(),
            envelope.timestamp
        );
        broadcaster.broadcast(envelope.event);
    }
    debug!("Event bus closed, forwarder exiting");
}

/// Apply one client command and produce the reply for that client.
pub async fn handle_command(registry: &RunRegistry, message: ClientMessage) -> WsReply {
    WS_COMMANDS_RECEIVED
        .with_label_values(&[message.type_name()])
        .inc();

    match message {
        ClientMessage::Ping => WsReply::Pong {
            timestamp: Utc::now().timestamp_millis(),
        },
        ClientMessage::CaptchaResponse { run_id, value } => {
            submit(registry, InputKind::Captcha, run_id, &value).await
        }
        ClientMessage::OtpResponse { run_id, value } => {
            submit(registry, InputKind::Otp, run_id, &value).await
        }
        ClientMessage::Stop { run_id: Some(id) } => WsReply::StopResult {
            stopped: registry.stop(&id).await,
            run_id: Some(id),
        },
        ClientMessage::Stop { run_id: None } => {
            let stopped = !registry.is_empty().await;
            registry.stop_all().await;
            WsReply::StopResult {
                run_id: None,
                stopped,
            }
        }
    }
}

async fn submit(
    registry: &RunRegistry,
    kind: InputKind,
    run_id: Option<String>,
    value: &str,
) -> WsReply {
    if !validate_input(kind, value) {
        return WsReply::Error {
            message: format!("Invalid {} format", kind),
        };
    }
    let value = value.trim();

    match run_id {
        Some(id) => WsReply::InputResult {
            kind,
            accepted: registry.submit_input(&id, kind, value).await.unwrap_or(false),
            run_id: Some(id),
        },
        None => {
            let run_id = registry.submit_to_waiting(kind, value).await;
            WsReply::InputResult {
                kind,
                accepted: run_id.is_some(),
                run_id,
            }
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Option<Message> {
    match serde_json::to_string(value) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to serialize WebSocket message: {}", e);
            None
        }
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe to broadcast events
    let mut rx = state.ws_broadcaster().subscribe();
    let (reply_tx, mut reply_rx) = mpsc::channel::<WsReply>(32);

    // Track connection metrics
    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    // Spawn task to forward events and replies to this client
    let send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                reply = reply_rx.recv() => match reply {
                    Some(reply) => {
                        WS_MESSAGES_SENT.with_label_values(&[reply.type_name()]).inc();
                        encode(&reply)
                    }
                    None => break,
                },
                result = rx.recv() => match result {
                    Ok(event) => {
                        WS_MESSAGES_SENT.with_label_values(&[event.event_type()]).inc();
                        encode(&event)
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged, skipped {} events", n);
                        WS_LAG_EVENTS.inc();
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                },
            };

            if let Some(message) = message {
                if sender.send(message).await.is_err() {
                    debug!("WebSocket send failed, client disconnected");
                    break;
                }
            }
        }
    });

    // Handle commands from the client
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(message) => handle_command(state.registry(), message).await,
                    Err(e) => {
                        debug!("Unparseable WebSocket message: {}", e);
                        WsReply::Error {
                            message: format!("Invalid message: {}", e),
                        }
                    }
                };
                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
            Ok(_) => {
                // Ping/pong frames are handled by axum
            }
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // Clean up
    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
