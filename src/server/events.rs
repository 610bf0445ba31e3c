//! WebSocket event broadcaster for real-time updates
//!
//! Bridges engine events to WebSocket clients.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::ServerAppState;
use crate::events::EventSink;

/// A server event that can be broadcast to WebSocket clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerEvent {
    /// Event type (e.g., "interview:block_transition", "diagnostic:completed")
    pub event: String,
    pub payload: serde_json::Value,
}

/// Broadcasts events to all connected WebSocket clients
pub struct EventBroadcaster {
    tx: broadcast::Sender<ServerEvent>,
}

impl EventBroadcaster {
    /// Create a new event broadcaster with a channel capacity of 1000 events
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1000);
        Self { tx }
    }

    pub fn broadcast(&self, event_type: &str, payload: serde_json::Value) {
        let event = ServerEvent {
            event: event_type.to_string(),
            payload,
        };

        // Ignore send errors (no receivers)
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBroadcaster {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        log::debug!("Broadcasting {}", event);
        self.broadcast(event, payload);
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServerAppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: ServerAppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut event_rx = state.broadcaster.subscribe();

    log::info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("Failed to serialize event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("WebSocket client lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                log::info!("WebSocket client disconnected");
                break;
            }
            Ok(Message::Text(text)) => {
                // Every client receives every event; inbound text is ignored
                log::debug!("Received text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("WebSocket error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    log::info!("WebSocket connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{self, BlockTransitionPayload, EVENT_BLOCK_TRANSITION};
    use crate::models::InterviewBlock;

    #[tokio::test]
    async fn test_sink_events_reach_subscribers() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        events::emit(
            &broadcaster,
            EVENT_BLOCK_TRANSITION,
            BlockTransitionPayload {
                session_id: "s1".to_string(),
                from: InterviewBlock::Context,
                to: InterviewBlock::Expertise,
                reason: "context complete, moving to expertise".to_string(),
                forced: false,
            },
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "interview:block_transition");
        assert_eq!(event.payload["to"], "expertise");
    }

    #[test]
    fn test_broadcast_without_receivers_is_ignored() {
        let broadcaster = EventBroadcaster::new();
        assert_eq!(broadcaster.receiver_count(), 0);
        broadcaster.broadcast("session:created", serde_json::json!({"sessionId": "s1"}));
    }

    #[test]
    fn test_server_event_serialization() {
        let event = ServerEvent {
            event: "diagnostic:completed".to_string(),
            payload: serde_json::json!({ "sessionId": "s1", "overallScore": 62 }),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("diagnostic:completed"));
        assert!(json.contains("\"overallScore\":62"));
    }
}
