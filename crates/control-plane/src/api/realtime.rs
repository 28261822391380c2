// Realtime (websocket) route
// Decision: One task per connection owns the socket; the registry only holds the sending half of its queue
// Decision: Deregistration happens in a drop guard so every exit path removes the subscriber exactly once
// Decision: Client frames are read only to notice close/transport errors, their content is ignored

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::fmt;
use std::sync::Arc;
use tokio::time::{Instant, Interval};

use crate::config::RealtimeConfig;
use crate::services::{Subscriber, SubscriberId, SubscriberRegistry};

/// App state for realtime routes
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SubscriberRegistry>,
    pub config: RealtimeConfig,
}

impl AppState {
    pub fn new(registry: Arc<SubscriberRegistry>, config: RealtimeConfig) -> Self {
        Self { registry, config }
    }
}

/// Create realtime routes
pub fn routes(state: AppState) -> Router {
    Router::new().route("/ws", get(subscribe)).with_state(state)
}

/// GET /ws - Subscribe to live metric samples
///
/// Upgrades to a websocket. Every sample posted to `/api/metrics` after the
/// connection opens is pushed as a text frame containing the submitted JSON.
#[utoipa::path(
    get,
    path = "/ws",
    responses(
        (status = 101, description = "Switching to websocket; samples follow as text frames")
    ),
    tag = "metrics"
)]
pub async fn subscribe(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_subscriber(socket, state))
}

/// Why a subscriber connection ended
#[derive(Debug)]
enum CloseReason {
    /// Client sent a close frame or the stream ended
    ClientClosed,
    /// Registry dropped us after a failed or timed-out delivery
    Evicted,
    SendFailed(axum::Error),
    SendTimedOut,
    Transport(axum::Error),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::ClientClosed => write!(f, "client closed"),
            CloseReason::Evicted => write!(f, "evicted by broadcaster"),
            CloseReason::SendFailed(e) => write!(f, "send failed: {e}"),
            CloseReason::SendTimedOut => write!(f, "send timed out"),
            CloseReason::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

/// Removes the subscriber from the registry when the connection task ends
struct Registration {
    registry: Arc<SubscriberRegistry>,
    id: SubscriberId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

async fn serve_subscriber(socket: WebSocket, state: AppState) {
    let (subscriber, mut samples) = Subscriber::channel(state.config.queue_capacity);
    let id = subscriber.id();
    state.registry.register(subscriber);
    let _registration = Registration {
        registry: state.registry.clone(),
        id,
    };

    let send_timeout = state.registry.send_timeout();
    let mut ping = state
        .config
        .ping_interval
        .map(|period| tokio::time::interval_at(Instant::now() + period, period));

    let (mut sink, mut stream) = socket.split();

    let reason = loop {
        tokio::select! {
            sample = samples.recv() => {
                let Some(sample) = sample else {
                    break CloseReason::Evicted;
                };
                let frame = Message::Text(sample.as_str().to_string());
                match tokio::time::timeout(send_timeout, sink.send(frame)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => break CloseReason::SendFailed(e),
                    Err(_) => break CloseReason::SendTimedOut,
                }
            }
            frame = stream.next() => match frame {
                None | Some(Ok(Message::Close(_))) => break CloseReason::ClientClosed,
                Some(Err(e)) => break CloseReason::Transport(e),
                Some(Ok(_)) => {}
            },
            _ = next_ping(&mut ping) => {
                match tokio::time::timeout(send_timeout, sink.send(Message::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => break CloseReason::SendFailed(e),
                    Err(_) => break CloseReason::SendTimedOut,
                }
            }
        }
    };

    if matches!(reason, CloseReason::Evicted) {
        // Best effort: the peer may already be gone
        let _ = tokio::time::timeout(send_timeout, sink.send(Message::Close(None))).await;
    }

    tracing::info!(subscriber_id = %id, reason = %reason, "Realtime connection closed");
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
