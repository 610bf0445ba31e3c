//! Server application state shared across handlers

use std::sync::Arc;

use super::events::EventBroadcaster;
use crate::interview::InterviewEngine;
use crate::shutdown::ShutdownState;

#[derive(Clone)]
pub struct ServerAppState {
    pub engine: Arc<InterviewEngine>,

    /// Event broadcaster for WebSocket clients
    pub broadcaster: Arc<EventBroadcaster>,

    pub shutdown_state: ShutdownState,
}

impl ServerAppState {
    /// Wire the engine's events into a fresh broadcaster
    pub fn new(engine: InterviewEngine, shutdown_state: ShutdownState) -> Self {
        let broadcaster = Arc::new(EventBroadcaster::new());
        let engine = engine.with_events(broadcaster.clone());
        Self {
            engine: Arc::new(engine),
            broadcaster,
            shutdown_state,
        }
    }
}
