//! Model orchestration
//!
//! Three narrow operations (expertise detection, risk-area selection and
//! diagnostic generation). Each one renders a prompt, calls the model under a
//! timeout, validates the reply, retries once with a corrective instruction
//! and otherwise falls back to a deterministic heuristic. None of them fail
//! the interview.

pub mod client;
pub mod cost;
pub mod diagnostic;
pub mod expertise;
pub mod parsing;
pub mod prompts;
pub mod risk;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, OnceCell};

use crate::config::ModelConfig;
use crate::error::EngineError;
use crate::interview::QuestionBank;
use crate::models::{
    Area, DiagnosticDraft, ExpertiseResult, InterviewSession, LeadValue, RiskSelection,
};

pub use client::{
    DisabledModelClient, HttpModelClient, ModelClient, ModelError, ModelReply, ModelRequest,
    Operation, TokenUsage,
};
pub use cost::{CallOutcome, CostLedger, ModelCall, SessionCost};
pub use parsing::{ParseError, Validate};
pub use prompts::{PromptRenderer, PROMPT_VERSION};

/// Draft plus the recoverable failures met while producing it
#[derive(Debug, Clone)]
pub struct DiagnosticOutcome {
    pub draft: DiagnosticDraft,
    pub degradations: Vec<String>,
}

pub struct ModelOrchestrator {
    client: Arc<dyn ModelClient>,
    config: ModelConfig,
    prompts: PromptRenderer,
    ledger: CostLedger,
    /// Diagnostic generation runs at most once per session
    generated: Mutex<HashMap<String, Arc<OnceCell<DiagnosticOutcome>>>>,
}

impl ModelOrchestrator {
    pub fn new(client: Arc<dyn ModelClient>, config: ModelConfig) -> Result<Self, EngineError> {
        let ledger = CostLedger::new(
            config.input_cost_per_mtok,
            config.output_cost_per_mtok,
            config.max_cost_per_session_usd,
        );
        Ok(Self {
            client,
            prompts: PromptRenderer::new()?,
            ledger,
            config,
            generated: Mutex::new(HashMap::new()),
        })
    }

    /// Build the client the configuration asks for, falling back to a disabled one
    pub fn client_from_config(config: &ModelConfig) -> Arc<dyn ModelClient> {
        if !config.enabled {
            log::info!("Model calls disabled; heuristics only");
            return Arc::new(DisabledModelClient);
        }
        match HttpModelClient::from_config(config) {
            Ok(client) => {
                log::info!("Model client: {} at {}", config.model, config.endpoint);
                Arc::new(client)
            }
            Err(e) => {
                log::warn!("Model client unavailable ({}); heuristics only", e);
                Arc::new(DisabledModelClient)
            }
        }
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    // ========================================================================
    // Call path
    // ========================================================================

    /// Render, call, validate; one corrective retry at most
    async fn call<T: DeserializeOwned + Validate>(
        &self,
        session_id: &str,
        operation: Operation,
        template: &str,
        context: &tera::Context,
        schema: serde_json::Value,
    ) -> Result<T, EngineError> {
        if !self.config.enabled {
            return Err(EngineError::Model("model calls are disabled".to_string()));
        }

        let system = self.prompts.system()?;
        let original = self.prompts.render(template, context)?;
        let mut prompt = original.clone();
        let mut last_error = EngineError::Model(format!("{} was not attempted", operation));

        for attempt in 1..=2u8 {
            if let Err((spent, limit)) = self.ledger.check_budget(session_id).await {
                log::warn!(
                    "Session {}: {} refused, budget spent (${:.4} of ${:.4})",
                    session_id,
                    operation,
                    spent,
                    limit
                );
                return Err(EngineError::BudgetExceeded {
                    session_id: session_id.to_string(),
                    spent,
                    limit,
                });
            }

            let request = ModelRequest {
                operation,
                system: system.clone(),
                prompt: prompt.clone(),
                schema: schema.clone(),
                max_tokens: self.config.max_tokens,
            };

            let started = Instant::now();
            let result = tokio::time::timeout(
                Duration::from_secs(self.config.timeout_secs),
                self.client.complete(&request),
            )
            .await;
            let duration_ms = started.elapsed().as_millis() as u64;

            let (outcome, usage, parsed, retryable) = match result {
                Err(_) => (
                    CallOutcome::Timeout,
                    TokenUsage::default(),
                    Err(EngineError::ModelTimeout {
                        operation: operation.to_string(),
                        seconds: self.config.timeout_secs,
                    }),
                    true,
                ),
                Ok(Err(e)) => {
                    let retryable = !matches!(
                        e,
                        ModelError::Unavailable(_)
                            | ModelError::Authentication(_)
                            | ModelError::Budget { .. }
                    );
                    (
                        CallOutcome::Error,
                        TokenUsage::default(),
                        Err(EngineError::Model(e.to_string())),
                        retryable,
                    )
                }
                Ok(Ok(reply)) => match parsing::parse_reply::<T>(&reply.text) {
                    Ok(value) => (CallOutcome::Success, reply.usage, Ok(value), false),
                    Err(e) => {
                        prompt = self.prompts.corrective(&original, &e.to_string())?;
                        (
                            CallOutcome::SchemaViolation,
                            reply.usage,
                            Err(EngineError::ModelSchemaViolation {
                                operation: operation.to_string(),
                                message: e.to_string(),
                            }),
                            true,
                        )
                    }
                },
            };

            self.ledger
                .record(
                    session_id,
                    ModelCall {
                        operation,
                        attempt,
                        input_tokens: usage.input_tokens,
                        output_tokens: usage.output_tokens,
                        cost_usd: self.ledger.price(&usage),
                        duration_ms,
                        outcome,
                        prompt_version: PROMPT_VERSION.to_string(),
                        at: Utc::now(),
                    },
                )
                .await;

            match parsed {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log::warn!(
                        "Session {}: {} attempt {} failed: {}",
                        session_id,
                        operation,
                        attempt,
                        e
                    );
                    last_error = e;
                    if !retryable {
                        break;
                    }
                }
            }
        }

        Err(last_error)
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Classify the respondent's primary area. Never fails.
    pub async fn detect_expertise(
        &self,
        bank: &QuestionBank,
        session: &InterviewSession,
    ) -> ExpertiseResult {
        let context = expertise::prompt_context(bank, session);
        let reply = self
            .call::<expertise::ExpertiseReply>(
                &session.id,
                Operation::ExpertiseDetection,
                prompts::EXPERTISE_DETECTION,
                &context,
                expertise::schema(),
            )
            .await;

        match reply.and_then(|r| {
            r.into_result()
                .map_err(|e| EngineError::ModelSchemaViolation {
                    operation: Operation::ExpertiseDetection.to_string(),
                    message: e.to_string(),
                })
        }) {
            Ok(result) => result,
            Err(e) => {
                let result = expertise::heuristic(session);
                log::warn!(
                    "Session {}: expertise detection fell back to keywords ({}); picked {}",
                    session.id,
                    e,
                    result.area
                );
                result
            }
        }
    }

    /// Pick `count` risk areas, refining graph `candidates` through the model.
    ///
    /// The graph suggestion is used whenever the model fails or returns fewer
    /// than `count` usable areas.
    pub async fn select_risk_areas(
        &self,
        bank: &QuestionBank,
        session: &InterviewSession,
        detected: Area,
        candidates: &[Area],
        count: usize,
    ) -> RiskSelection {
        let context = risk::prompt_context(bank, session, detected, candidates, count);
        let reply = self
            .call::<risk::RiskReply>(
                &session.id,
                Operation::RiskSelection,
                prompts::RISK_SELECTION,
                &context,
                risk::schema(count),
            )
            .await;

        let reason = match reply {
            Ok(reply) => match reply.select(detected, count) {
                Some(selection) => return selection,
                None => format!("model returned fewer than {} usable areas", count),
            },
            Err(e) => e.to_string(),
        };
        let selection = risk::heuristic(detected, candidates, count);
        log::warn!(
            "Session {}: risk selection fell back to the area graph ({}); picked {:?}",
            session.id,
            reason,
            selection.areas
        );
        selection
    }

    /// Produce the qualitative draft, once per session.
    ///
    /// Low-value leads skip the model unless `override_lead_gate` is set.
    /// Every skip or fallback is returned as a degradation.
    pub async fn generate_diagnostic(
        &self,
        bank: &QuestionBank,
        session: &InterviewSession,
        lead_value: LeadValue,
        override_lead_gate: bool,
    ) -> DiagnosticOutcome {
        let cell = {
            let mut generated = self.generated.lock().await;
            generated
                .entry(session.id.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| self.generate_uncached(bank, session, lead_value, override_lead_gate))
            .await
            .clone()
    }

    async fn generate_uncached(
        &self,
        bank: &QuestionBank,
        session: &InterviewSession,
        lead_value: LeadValue,
        override_lead_gate: bool,
    ) -> DiagnosticOutcome {
        if lead_value == LeadValue::Low && self.config.skip_low_value_leads && !override_lead_gate
        {
            log::info!(
                "Session {}: low-value lead, skipping model diagnostic",
                session.id
            );
            return DiagnosticOutcome {
                draft: diagnostic::heuristic(bank, session),
                degradations: vec![
                    "model diagnostic skipped for a low-value lead; findings are rule-based"
                        .to_string(),
                ],
            };
        }

        let context = diagnostic::prompt_context(bank, session);
        let reply = self
            .call::<diagnostic::DiagnosticReply>(
                &session.id,
                Operation::DiagnosticGeneration,
                prompts::DIAGNOSTIC_GENERATION,
                &context,
                diagnostic::schema(),
            )
            .await
            .and_then(|r| {
                r.into_draft().map_err(|e| EngineError::ModelSchemaViolation {
                    operation: Operation::DiagnosticGeneration.to_string(),
                    message: e.to_string(),
                })
            });

        match reply {
            Ok(draft) => {
                log::info!("Session {}: model diagnostic generated", session.id);
                DiagnosticOutcome {
                    draft,
                    degradations: Vec::new(),
                }
            }
            Err(e) => {
                log::warn!(
                    "Session {}: diagnostic generation fell back to rules ({})",
                    session.id,
                    e
                );
                let degradation = match &e {
                    EngineError::BudgetExceeded { spent, limit, .. } => format!(
                        "model diagnostic skipped: budget spent (${:.4} of ${:.4}); findings are rule-based",
                        spent, limit
                    ),
                    other => format!(
                        "model diagnostic unavailable ({}); findings are rule-based",
                        other
                    ),
                };
                DiagnosticOutcome {
                    draft: diagnostic::heuristic(bank, session),
                    degradations: vec![degradation],
                }
            }
        }
    }

    // ========================================================================
    // Accounting
    // ========================================================================

    pub async fn session_cost(&self, session_id: &str) -> SessionCost {
        self.ledger.summary(session_id).await
    }

    pub async fn forget(&self, session_id: &str) {
        self.ledger.forget(session_id).await;
        self.generated.lock().await.remove(session_id);
    }
}
