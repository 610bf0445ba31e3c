//! Interview engine
//!
//! Facade over the session store, router, weak-signal detection and model
//! orchestration. Per-question routing stays synchronous; the model is only
//! consulted at block boundaries (expertise detection, risk selection) and
//! once at completion.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::area_graph::AreaGraph;
use super::question_bank::QuestionBank;
use super::router::{BlockRouter, RouteDecision};
use super::scoring::{assess_lead_value, Scorer};
use super::signals::{build_follow_up, CompositeDetector, SignalContext};
use crate::config::{EngineConfig, InterviewConfig};
use crate::error::EngineError;
use crate::events::{
    self, BlockTransitionPayload, DiagnosticCompletedPayload, EventSink, ExtractionFailedPayload,
    FollowUpIssuedPayload, ModelFallbackPayload, NoopSink, SessionCreatedPayload,
    SessionDeletedPayload,
};
use crate::models::{
    Area, BlockTransition, CompletionMetrics, Diagnostic, FieldValue, FollowUpQuestion,
    InputType, InterviewBlock, InterviewSession, Question, ResultSource, SessionContext,
    SessionStats, SessionStatus,
};
use crate::orchestration::{ModelClient, ModelOrchestrator, Operation, SessionCost};
use crate::storage::{KeyValueStore, SessionStore};
use crate::synthesis::Synthesizer;

/// Upper bound on route/model round trips within one call
const MAX_ROUTING_PASSES: usize = 4;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
    pub current_block: InterviewBlock,
    pub started_at: DateTime<Utc>,
}

/// A question as shown to the respondent (catalog or follow-up)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    /// Id to send back with the answer
    pub id: String,
    pub text: String,
    pub block: InterviewBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Area>,
    pub input_type: InputType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub is_follow_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_question_id: Option<String>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            text: question.text.clone(),
            block: question.block,
            area: question.area,
            input_type: question.input_type,
            options: question.options.clone(),
            is_follow_up: false,
            parent_question_id: None,
        }
    }
}

impl QuestionView {
    /// A follow-up is answered like its parent question
    fn follow_up(follow_up: &FollowUpQuestion, parent: &Question) -> Self {
        Self {
            id: follow_up.id.clone(),
            text: follow_up.text.clone(),
            is_follow_up: true,
            parent_question_id: Some(parent.id.clone()),
            ..QuestionView::from(parent)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingMetadata {
    pub current_block: InterviewBlock,
    pub block_question_index: usize,
    /// Transitions performed while routing this request
    pub block_transitions: Vec<BlockTransition>,
    pub detected_area: Option<Area>,
    pub risk_areas: Option<Vec<Area>>,
    pub follow_ups_remaining: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionResponse {
    pub question: Option<QuestionView>,
    pub routing_metadata: RoutingMetadata,
    pub should_finish: bool,
    pub completion_metrics: CompletionMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    pub extracted_data: BTreeMap<String, FieldValue>,
    pub completeness_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_transition: Option<BlockTransition>,
    /// Set when the answer was stored but no value could be extracted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
    pub follow_up_pending: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOptions {
    /// Run model diagnostic generation even for low-value leads
    #[serde(default)]
    pub override_lead_gate: bool,
    /// Produce a diagnostic before the interview is finished
    #[serde(default)]
    pub allow_partial: bool,
}

// ============================================================================
// Engine
// ============================================================================

pub struct InterviewEngine {
    store: SessionStore,
    bank: Arc<QuestionBank>,
    graph: Arc<AreaGraph>,
    scorer: Arc<Scorer>,
    router: BlockRouter,
    detector: CompositeDetector,
    orchestrator: ModelOrchestrator,
    events: Arc<dyn EventSink>,
    config: InterviewConfig,
}

impl InterviewEngine {
    /// Engine over the built-in catalog and area graph
    pub fn new(
        config: &EngineConfig,
        kv: Arc<dyn KeyValueStore>,
        client: Arc<dyn ModelClient>,
    ) -> Result<Self, EngineError> {
        let graph = AreaGraph::default().with_max_distance(config.interview.max_risk_distance);
        Self::from_parts(config, QuestionBank::default(), graph, kv, client)
    }

    pub fn from_parts(
        config: &EngineConfig,
        bank: QuestionBank,
        graph: AreaGraph,
        kv: Arc<dyn KeyValueStore>,
        client: Arc<dyn ModelClient>,
    ) -> Result<Self, EngineError> {
        let bank = Arc::new(bank);
        let scorer = Arc::new(Scorer::new(
            config.interview.clone(),
            config.scoring.clone(),
        ));
        let ttl = match config.storage.session_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let detector = CompositeDetector::with_defaults(config.interview.signal_threshold);
        let orchestrator = ModelOrchestrator::new(client, config.model.clone())?;
        log::info!(
            "Interview engine ready: {} questions, detectors {:?}, model client {}",
            bank.question_count(),
            detector.detector_names(),
            orchestrator.client_name()
        );

        Ok(Self {
            store: SessionStore::new(kv, bank.clone(), scorer.clone(), ttl),
            router: BlockRouter::new(bank.clone(), scorer.clone(), config.interview.clone()),
            detector,
            orchestrator,
            events: Arc::new(NoopSink),
            config: config.interview.clone(),
            graph: Arc::new(graph),
            bank,
            scorer,
        })
    }

    /// Route engine events to `sink`
    pub fn with_events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn graph(&self) -> &AreaGraph {
        &self.graph
    }

    pub fn model_client_name(&self) -> &str {
        self.orchestrator.client_name()
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    pub async fn create_session(
        &self,
        context: SessionContext,
    ) -> Result<SessionCreated, EngineError> {
        let session = self.store.create_session(context).await?;
        events::emit(
            self.events.as_ref(),
            events::EVENT_SESSION_CREATED,
            SessionCreatedPayload {
                session_id: session.id.clone(),
                started_at: session.started_at.to_rfc3339(),
            },
        );
        Ok(SessionCreated {
            session_id: session.id,
            current_block: session.current_block,
            started_at: session.started_at,
        })
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), EngineError> {
        self.store.delete_session(session_id).await?;
        self.orchestrator.forget(session_id).await;
        events::emit(
            self.events.as_ref(),
            events::EVENT_SESSION_DELETED,
            SessionDeletedPayload {
                session_id: session_id.to_string(),
            },
        );
        Ok(())
    }

    pub async fn stats(&self, session_id: &str) -> Result<SessionStats, EngineError> {
        self.store.get_session_stats(session_id).await
    }

    pub async fn cost(&self, session_id: &str) -> Result<SessionCost, EngineError> {
        self.store.get_session(session_id).await?;
        Ok(self.orchestrator.session_cost(session_id).await)
    }

    pub async fn diagnostic(&self, diagnostic_id: &str) -> Result<Option<Diagnostic>, EngineError> {
        self.store.get_diagnostic(diagnostic_id).await
    }

    /// Expiry hook for the background sweeper. Returns how many sessions
    /// were purged; their model-call state goes with them.
    pub async fn purge_expired(&self) -> Result<usize, EngineError> {
        let expired = self.store.purge_expired().await?;
        for session_id in &expired {
            self.orchestrator.forget(session_id).await;
            log::debug!("Session {} expired", session_id);
        }
        Ok(expired.len())
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Route until the router settles on something to show (or finish),
    /// resolving model-backed preconditions on the way
    async fn route(
        &self,
        session: &mut InterviewSession,
    ) -> Result<(RouteDecision, Vec<BlockTransition>), EngineError> {
        let mut transitions = Vec::new();

        for _ in 0..MAX_ROUTING_PASSES {
            let outcome = self.router.route_to_next_question(session)?;
            for transition in &outcome.transitions {
                self.emit_transition(&session.id, transition);
            }
            transitions.extend(outcome.transitions);

            match outcome.decision {
                RouteDecision::NeedsExpertiseDetection => {
                    let result = self.orchestrator.detect_expertise(&self.bank, session).await;
                    if result.source != ResultSource::Model {
                        self.emit_fallback(
                            &session.id,
                            Operation::ExpertiseDetection,
                            &result.reasoning,
                        );
                    }
                    log::info!(
                        "Session {}: detected expertise {} ({:.2}, {:?})",
                        session.id,
                        result.area,
                        result.confidence,
                        result.source
                    );
                    let area = result.area;
                    session.set_detected_expertise(result)?;
                    session.set_deep_dive_area(area);
                    self.store.refresh(session);
                }
                RouteDecision::NeedsRiskSelection => {
                    let detected = session.detected_area.ok_or_else(|| {
                        EngineError::InvalidState(
                            "risk areas requested before expertise was detected".to_string(),
                        )
                    })?;
                    let exclude: Vec<Area> = session
                        .deep_dive_area
                        .into_iter()
                        .filter(|a| *a != detected)
                        .collect();
                    let candidates = self.graph.suggest_risk_scan_areas(detected, &exclude);
                    let count = self.config.risk_area_count.min(candidates.len());

                    let selection = self
                        .orchestrator
                        .select_risk_areas(&self.bank, session, detected, &candidates, count)
                        .await;
                    if selection.source != ResultSource::Model {
                        self.emit_fallback(
                            &session.id,
                            Operation::RiskSelection,
                            &selection.reasoning,
                        );
                    }
                    log::info!(
                        "Session {}: risk areas {:?} ({:?})",
                        session.id,
                        selection.areas,
                        selection.source
                    );
                    session.set_risk_scan_areas(selection, count)?;
                    self.store.refresh(session);
                }
                decision => return Ok((decision, transitions)),
            }
        }

        Err(EngineError::InvalidState(format!(
            "routing for session {} did not settle",
            session.id
        )))
    }

    fn question_view(&self, decision: &RouteDecision) -> Result<Option<QuestionView>, EngineError> {
        Ok(match decision {
            RouteDecision::Ask(question) => Some(QuestionView::from(question)),
            RouteDecision::FollowUp(follow_up) => {
                let parent = self.bank.get_question_by_id(&follow_up.parent_question_id)?;
                Some(QuestionView::follow_up(follow_up, parent))
            }
            _ => None,
        })
    }

    fn routing_metadata(
        &self,
        session: &InterviewSession,
        transitions: Vec<BlockTransition>,
    ) -> RoutingMetadata {
        RoutingMetadata {
            current_block: session.current_block,
            block_question_index: session.block_question_index,
            block_transitions: transitions,
            detected_area: session.detected_area,
            risk_areas: session.risk_areas.clone(),
            follow_ups_remaining: self
                .config
                .follow_up_budget
                .saturating_sub(session.follow_ups_issued),
        }
    }

    /// What to ask next. `question` is `None` once the interview should finish.
    pub async fn next_question(&self, session_id: &str) -> Result<NextQuestionResponse, EngineError> {
        let mut session = self.store.get_session(session_id).await?;

        if session.is_completed() {
            let metrics = self.store.report(&session).to_metrics();
            return Ok(NextQuestionResponse {
                question: None,
                routing_metadata: self.routing_metadata(&session, Vec::new()),
                should_finish: true,
                completion_metrics: metrics,
            });
        }

        let (decision, transitions) = self.route(&mut session).await?;
        self.store.refresh(&mut session);
        self.store.save_session(&session).await?;

        let question = self.question_view(&decision)?;
        let should_finish = matches!(decision, RouteDecision::Finish);
        Ok(NextQuestionResponse {
            question,
            should_finish,
            completion_metrics: self.store.report(&session).to_metrics(),
            routing_metadata: self.routing_metadata(&session, transitions),
        })
    }

    // ========================================================================
    // Answers
    // ========================================================================

    /// Record an answer, maybe issue a follow-up, and advance blocks whose
    /// criteria are now met
    pub async fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        answer_text: &str,
    ) -> Result<SubmitAnswerResponse, EngineError> {
        let mut session = self.store.get_session(session_id).await?;
        let applied = self.store.apply_answer(&mut session, question_id, answer_text)?;

        if let Some(EngineError::ExtractionFailure {
            question_id,
            field,
            reason,
        }) = &applied.extraction_error
        {
            events::emit(
                self.events.as_ref(),
                events::EVENT_EXTRACTION_FAILED,
                ExtractionFailedPayload {
                    session_id: session.id.clone(),
                    question_id: question_id.clone(),
                    field: field.clone(),
                    reason: reason.clone(),
                },
            );
        }

        let mut candidate = None;
        if applied.follow_up_id.is_none() && session.follow_ups_issued < self.config.follow_up_budget
        {
            let report = self.detector.evaluate(&SignalContext {
                question: &applied.question,
                answer: answer_text,
                previous_value: applied.previous_value.as_ref(),
                min_answer_chars: self.config.min_answer_chars,
            });
            if let (true, Some(signal)) = (report.triggered, report.strongest()) {
                let follow_up =
                    build_follow_up(&applied.question, signal, session.follow_ups_issued + 1);
                candidate = Some((follow_up.id.clone(), signal.clone()));
                session.pending_follow_up = Some(follow_up);
            }
        }

        let (_, transitions) = self.route(&mut session).await?;

        // Routing drops the follow-up when the assessment can already finish;
        // only one that survives counts against the budget
        if let Some((follow_up_id, signal)) = candidate {
            match &session.pending_follow_up {
                Some(follow_up) if follow_up.id == follow_up_id => {
                    session.follow_ups_issued += 1;
                    log::info!(
                        "Session {}: follow-up {} issued ({}: {})",
                        session.id,
                        follow_up.id,
                        signal.kind.as_str(),
                        signal.reason
                    );
                    events::emit(
                        self.events.as_ref(),
                        events::EVENT_FOLLOW_UP_ISSUED,
                        FollowUpIssuedPayload {
                            session_id: session.id.clone(),
                            follow_up_id: follow_up.id.clone(),
                            parent_question_id: follow_up.parent_question_id.clone(),
                            signal: follow_up.signal,
                            issued: session.follow_ups_issued,
                        },
                    );
                }
                _ => log::debug!(
                    "Session {}: follow-up {} dropped, assessment can finish",
                    session.id,
                    follow_up_id
                ),
            }
        }

        self.store.refresh(&mut session);
        self.store.save_session(&session).await?;

        Ok(SubmitAnswerResponse {
            extracted_data: session.extracted_data.clone(),
            completeness_score: session.completeness_score,
            block_transition: transitions.into_iter().last(),
            extraction_error: applied.extraction_error.map(|e| e.to_string()),
            follow_up_pending: session.pending_follow_up.is_some(),
        })
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Produce the diagnostic. Idempotent: a completed session returns its
    /// stored diagnostic.
    pub async fn complete(
        &self,
        session_id: &str,
        options: CompleteOptions,
    ) -> Result<Diagnostic, EngineError> {
        if let Some(existing) = self.store.diagnostic_for_session(session_id).await? {
            return Ok(existing);
        }

        let mut session = self.store.get_session(session_id).await?;
        if !self.router.can_finish_assessment(&session) {
            if !options.allow_partial {
                return Err(EngineError::AssessmentNotFinished(format!(
                    "session {} is still in the {} block",
                    session.id, session.current_block
                )));
            }
            log::warn!(
                "Session {}: completing early from the {} block",
                session.id,
                session.current_block
            );
            session.notes.push(format!(
                "interview completed early from the {} block",
                session.current_block
            ));
        }

        let lead_value = assess_lead_value(&session.extracted_data);
        let outcome = self
            .orchestrator
            .generate_diagnostic(&self.bank, &session, lead_value, options.override_lead_gate)
            .await;
        for degradation in &outcome.degradations {
            self.emit_fallback(&session.id, Operation::DiagnosticGeneration, degradation);
        }

        let synthesizer = Synthesizer::new(&self.bank, &self.graph, &self.scorer);
        let diagnostic = synthesizer.synthesize(
            &session,
            session.expertise.as_ref(),
            session.risk_selection.as_ref(),
            &outcome.draft,
            lead_value,
            outcome.degradations,
        );

        session.status = SessionStatus::Completed;
        session.pending_follow_up = None;
        session.diagnostic_id = Some(diagnostic.id.clone());
        self.store.refresh(&mut session);
        session.touch();

        self.store.save_diagnostic(&diagnostic).await?;
        self.store.save_session(&session).await?;

        log::info!(
            "Session {}: diagnostic {} generated (score {}, confidence {})",
            session.id,
            diagnostic.id,
            diagnostic.overall_score,
            diagnostic.confidence
        );
        events::emit(
            self.events.as_ref(),
            events::EVENT_DIAGNOSTIC_COMPLETED,
            DiagnosticCompletedPayload {
                session_id: session.id.clone(),
                diagnostic_id: diagnostic.id.clone(),
                overall_score: diagnostic.overall_score,
                confidence: diagnostic.confidence,
                detected_area: diagnostic.detected_area,
            },
        );
        Ok(diagnostic)
    }

    // ========================================================================
    // Events
    // ========================================================================

    fn emit_transition(&self, session_id: &str, transition: &BlockTransition) {
        events::emit(
            self.events.as_ref(),
            events::EVENT_BLOCK_TRANSITION,
            BlockTransitionPayload {
                session_id: session_id.to_string(),
                from: transition.from,
                to: transition.to,
                reason: transition.reason.clone(),
                forced: transition.forced,
            },
        );
    }

    fn emit_fallback(&self, session_id: &str, operation: Operation, reason: &str) {
        events::emit(
            self.events.as_ref(),
            events::EVENT_MODEL_FALLBACK,
            ModelFallbackPayload {
                session_id: session_id.to_string(),
                operation: operation.to_string(),
                reason: reason.to_string(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::DisabledModelClient;
    use crate::storage::MemoryStore;

    fn engine() -> InterviewEngine {
        InterviewEngine::new(
            &EngineConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(DisabledModelClient),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_first_question_is_first_context_question() {
        let engine = engine();
        let created = engine.create_session(SessionContext::default()).await.unwrap();
        let next = engine.next_question(&created.session_id).await.unwrap();
        assert!(!next.should_finish);
        assert_eq!(next.question.unwrap().id, "ctx_company");
        assert_eq!(next.routing_metadata.current_block, InterviewBlock::Context);
        assert_eq!(next.routing_metadata.follow_ups_remaining, 3);
    }

    #[tokio::test]
    async fn test_unquantified_answer_issues_follow_up() {
        let engine = engine();
        let created = engine.create_session(SessionContext::default()).await.unwrap();
        let response = engine
            .submit_answer(&created.session_id, "ctx_team_size", "a decent sized team")
            .await
            .unwrap();
        assert!(response.follow_up_pending);
        assert!(response.extraction_error.is_some());

        let next = engine.next_question(&created.session_id).await.unwrap();
        let question = next.question.unwrap();
        assert!(question.is_follow_up);
        assert_eq!(question.parent_question_id.as_deref(), Some("ctx_team_size"));
        assert_eq!(question.input_type, InputType::Number);

        let response = engine
            .submit_answer(&created.session_id, &question.id, "around 30 people")
            .await
            .unwrap();
        assert!(!response.follow_up_pending);
        assert_eq!(
            response.extracted_data.get("team_size"),
            Some(&FieldValue::Number(30.0))
        );
    }

    #[tokio::test]
    async fn test_filled_follow_up_is_not_reported_as_missing() {
        let engine = engine();
        let id = engine
            .create_session(SessionContext::default())
            .await
            .unwrap()
            .session_id;
        engine
            .submit_answer(&id, "ctx_team_size", "a decent sized team")
            .await
            .unwrap();
        let follow_up = engine.next_question(&id).await.unwrap().question.unwrap();
        engine
            .submit_answer(&id, &follow_up.id, "around 30 people")
            .await
            .unwrap();

        let session = engine.store().get_session(&id).await.unwrap();
        assert!(session.extraction_failures.is_empty());
        assert!(!session.gaps_identified.contains(&"team_size".to_string()));

        let diagnostic = engine
            .complete(
                &id,
                CompleteOptions {
                    allow_partial: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!diagnostic
            .recommendations
            .iter()
            .any(|r| r.description.contains("team_size")));
        assert!(!diagnostic
            .detected_patterns
            .iter()
            .any(|p| p.evidence.iter().any(|e| e.contains("around 30 people"))));
    }

    #[tokio::test]
    async fn test_purge_releases_model_call_state() {
        let engine = engine();
        let id = engine
            .create_session(SessionContext::default())
            .await
            .unwrap()
            .session_id;
        engine
            .complete(
                &id,
                CompleteOptions {
                    allow_partial: true,
                    override_lead_gate: true,
                },
            )
            .await
            .unwrap();
        assert!(!engine.orchestrator.session_cost(&id).await.calls.is_empty());

        engine
            .store()
            .expire_session(&id, Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(engine.purge_expired().await.unwrap(), 1);
        assert!(engine.orchestrator.session_cost(&id).await.calls.is_empty());
        assert!(matches!(
            engine.stats(&id).await,
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_complete_before_finish_is_refused() {
        let engine = engine();
        let created = engine.create_session(SessionContext::default()).await.unwrap();
        assert!(matches!(
            engine
                .complete(&created.session_id, CompleteOptions::default())
                .await,
            Err(EngineError::AssessmentNotFinished(_))
        ));

        let partial = engine
            .complete(
                &created.session_id,
                CompleteOptions {
                    allow_partial: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(partial
            .degradations
            .iter()
            .any(|d| d.contains("completed early")));

        let again = engine
            .complete(&created.session_id, CompleteOptions::default())
            .await
            .unwrap();
        assert_eq!(again.id, partial.id);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let engine = engine();
        assert!(matches!(
            engine.next_question("missing").await,
            Err(EngineError::SessionNotFound(_))
        ));
        assert!(matches!(
            engine.submit_answer("missing", "ctx_company", "x").await,
            Err(EngineError::SessionNotFound(_))
        ));
        assert!(matches!(
            engine.cost("missing").await,
            Err(EngineError::SessionNotFound(_))
        ));
    }
}
