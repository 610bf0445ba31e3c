// Event types and payload structures for real-time updates
// These are broadcast via WebSocket to connected clients

use serde::{Deserialize, Serialize};

use crate::models::{Area, ConfidenceTier, InterviewBlock, SignalKind};

// Event name constants
pub const EVENT_SESSION_CREATED: &str = "session:created";
pub const EVENT_SESSION_DELETED: &str = "session:deleted";
pub const EVENT_BLOCK_TRANSITION: &str = "interview:block_transition";
pub const EVENT_FOLLOW_UP_ISSUED: &str = "interview:follow_up_issued";
pub const EVENT_EXTRACTION_FAILED: &str = "interview:extraction_failed";
pub const EVENT_MODEL_FALLBACK: &str = "model:fallback";
pub const EVENT_DIAGNOSTIC_COMPLETED: &str = "diagnostic:completed";

/// Where engine events go. The server broadcasts them; tests and the
/// library default drop them.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, payload: serde_json::Value);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &str, _payload: serde_json::Value) {}
}

/// Serialize a payload and hand it to the sink
pub fn emit(sink: &dyn EventSink, event: &str, payload: impl Serialize) {
    match serde_json::to_value(payload) {
        Ok(value) => sink.emit(event, value),
        Err(e) => log::warn!("Failed to serialize {} payload: {}", event, e),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreatedPayload {
    pub session_id: String,
    pub started_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDeletedPayload {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTransitionPayload {
    pub session_id: String,
    pub from: InterviewBlock,
    pub to: InterviewBlock,
    pub reason: String,
    pub forced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpIssuedPayload {
    pub session_id: String,
    pub follow_up_id: String,
    pub parent_question_id: String,
    pub signal: SignalKind,
    /// Follow-ups issued so far, including this one
    pub issued: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionFailedPayload {
    pub session_id: String,
    pub question_id: String,
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelFallbackPayload {
    pub session_id: String,
    /// "expertise_detection", "risk_selection" or "diagnostic_generation"
    pub operation: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticCompletedPayload {
    pub session_id: String,
    pub diagnostic_id: String,
    pub overall_score: u8,
    pub confidence: ConfidenceTier,
    pub detected_area: Option<Area>,
}
