// Cost ledger - token and USD accounting for every model call, per session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::client::{Operation, TokenUsage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    SchemaViolation,
    Timeout,
    Error,
}

/// One model call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCall {
    pub operation: Operation,
    /// 1 for the first attempt, 2 for the corrective retry
    pub attempt: u8,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub duration_ms: u64,
    pub outcome: CallOutcome,
    pub prompt_version: String,
    pub at: DateTime<Utc>,
}

/// Cumulative spend for one session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCost {
    pub session_id: String,
    pub total_usd: f64,
    pub budget_usd: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub calls: Vec<ModelCall>,
}

pub struct CostLedger {
    input_cost_per_mtok: f64,
    output_cost_per_mtok: f64,
    budget_usd: f64,
    calls: RwLock<HashMap<String, Vec<ModelCall>>>,
}

impl CostLedger {
    pub fn new(input_cost_per_mtok: f64, output_cost_per_mtok: f64, budget_usd: f64) -> Self {
        Self {
            input_cost_per_mtok,
            output_cost_per_mtok,
            budget_usd,
            calls: RwLock::new(HashMap::new()),
        }
    }

    /// USD cost of a call with the given usage
    pub fn price(&self, usage: &TokenUsage) -> f64 {
        (usage.input_tokens as f64 * self.input_cost_per_mtok
            + usage.output_tokens as f64 * self.output_cost_per_mtok)
            / 1_000_000.0
    }

    pub async fn record(&self, session_id: &str, call: ModelCall) {
        log::info!(
            "Model call {} attempt {} for session {}: {:?}, {} in / {} out tokens, ${:.4}, {}ms",
            call.operation,
            call.attempt,
            session_id,
            call.outcome,
            call.input_tokens,
            call.output_tokens,
            call.cost_usd,
            call.duration_ms
        );
        let mut calls = self.calls.write().await;
        calls.entry(session_id.to_string()).or_default().push(call);
    }

    pub async fn spent(&self, session_id: &str) -> f64 {
        let calls = self.calls.read().await;
        calls
            .get(session_id)
            .map(|c| c.iter().map(|call| call.cost_usd).sum())
            .unwrap_or(0.0)
    }

    /// `Err((spent, limit))` once the session has used its budget
    pub async fn check_budget(&self, session_id: &str) -> Result<(), (f64, f64)> {
        let spent = self.spent(session_id).await;
        if spent >= self.budget_usd {
            return Err((spent, self.budget_usd));
        }
        Ok(())
    }

    pub async fn summary(&self, session_id: &str) -> SessionCost {
        let calls = self.calls.read().await;
        let session_calls = calls.get(session_id).cloned().unwrap_or_default();
        SessionCost {
            session_id: session_id.to_string(),
            total_usd: session_calls.iter().map(|c| c.cost_usd).sum(),
            budget_usd: self.budget_usd,
            input_tokens: session_calls.iter().map(|c| c.input_tokens as u64).sum(),
            output_tokens: session_calls.iter().map(|c| c.output_tokens as u64).sum(),
            calls: session_calls,
        }
    }

    pub async fn forget(&self, session_id: &str) {
        self.calls.write().await.remove(session_id);
    }
}
