// Session store - interview state persisted through a key-value store

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::{get_json, set_json, KeyValueStore};
use crate::error::EngineError;
use crate::interview::extraction::extract;
use crate::interview::{CompletenessReport, QuestionBank, Scorer};
use crate::models::{
    Answer, Area, BlockTransition, Diagnostic, ExpertiseResult, ExtractionGap, FieldValue,
    InterviewBlock, InterviewSession, Question, RiskSelection, SessionContext, SessionStats,
};

pub const SESSION_PREFIX: &str = "session:";
const DIAGNOSTIC_PREFIX: &str = "diagnostic:";
const DIAGNOSTIC_INDEX_PREFIX: &str = "diagnostic-for:";

/// Result of recording one answer
#[derive(Debug, Clone)]
pub struct AnswerApplied {
    /// Catalog question whose extraction rule ran (the parent, for follow-ups)
    pub question: Question,
    pub follow_up_id: Option<String>,
    pub extracted: Option<FieldValue>,
    pub extraction_error: Option<EngineError>,
    /// Value the field held before this answer
    pub previous_value: Option<FieldValue>,
}

pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    bank: Arc<QuestionBank>,
    scorer: Arc<Scorer>,
    ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        bank: Arc<QuestionBank>,
        scorer: Arc<Scorer>,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            kv,
            bank,
            scorer,
            ttl,
        }
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    fn session_key(id: &str) -> String {
        format!("{}{}", SESSION_PREFIX, id)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub async fn create_session(
        &self,
        context: SessionContext,
    ) -> Result<InterviewSession, EngineError> {
        let mut session = InterviewSession::new(context);
        self.refresh(&mut session);
        self.save_session(&session).await?;
        log::info!("Created session {}", session.id);
        Ok(session)
    }

    pub async fn get_session(&self, id: &str) -> Result<InterviewSession, EngineError> {
        get_json(self.kv.as_ref(), &Self::session_key(id))
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))
    }

    /// Persist a session, restarting its time to live
    pub async fn save_session(&self, session: &InterviewSession) -> Result<(), EngineError> {
        set_json(self.kv.as_ref(), &Self::session_key(&session.id), session, self.ttl).await
    }

    pub async fn delete_session(&self, id: &str) -> Result<(), EngineError> {
        if !self.kv.delete(&Self::session_key(id)).await? {
            return Err(EngineError::SessionNotFound(id.to_string()));
        }
        log::info!("Deleted session {}", id);
        Ok(())
    }

    /// Expiry hook: shorten or extend a session's time to live
    pub async fn expire_session(&self, id: &str, ttl: Duration) -> Result<(), EngineError> {
        if !self.kv.expire(&Self::session_key(id), ttl).await? {
            return Err(EngineError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Drop expired entries, returning the ids of the sessions among them
    pub async fn purge_expired(&self) -> Result<Vec<String>, EngineError> {
        let removed = self.kv.purge_expired().await?;
        if !removed.is_empty() {
            log::info!("Purged {} expired entries", removed.len());
        }
        Ok(removed
            .iter()
            .filter_map(|key| key.strip_prefix(SESSION_PREFIX))
            .map(|id| id.to_string())
            .collect())
    }

    // ========================================================================
    // Answers
    // ========================================================================

    /// Append an answer, run its extraction rule and refresh derived state.
    ///
    /// Extraction failures never fail the call; they are recorded as gaps.
    pub fn apply_answer(
        &self,
        session: &mut InterviewSession,
        question_id: &str,
        text: &str,
    ) -> Result<AnswerApplied, EngineError> {
        if session.is_completed() {
            return Err(EngineError::InvalidState(format!(
                "session {} is already completed",
                session.id
            )));
        }

        let addressed = session
            .pending_follow_up
            .as_ref()
            .map_or(false, |f| f.id == question_id);
        let pending = if addressed {
            session.pending_follow_up.take()
        } else {
            None
        };
        let (question, follow_up_id) = match pending {
            Some(follow_up) => (
                self.bank
                    .get_question_by_id(&follow_up.parent_question_id)?
                    .clone(),
                Some(follow_up.id),
            ),
            None => {
                let question = self.bank.get_question_by_id(question_id)?.clone();
                self.check_answerable(session, &question)?;
                if let Some(skipped) = session.pending_follow_up.take() {
                    log::debug!("Session {}: follow-up {} skipped", session.id, skipped.id);
                }
                (question, None)
            }
        };

        let field = question.field().to_string();
        let previous_value = session.extracted_data.get(&field).cloned();

        session.answers.push(Answer {
            question_id: question.id.clone(),
            text: text.to_string(),
            timestamp: Utc::now(),
            block: session.current_block,
            follow_up_id: follow_up_id.clone(),
        });

        let (extracted, extraction_error) = match extract(&question, text) {
            Ok(value) => {
                session.merge_extracted([(field, value.clone())]);
                (Some(value), None)
            }
            Err(e) => {
                log::warn!("Session {}: {}", session.id, e);
                record_gap(session, &e);
                (None, Some(e))
            }
        };

        session.block_question_index = session.answers_in_block(session.current_block);
        self.refresh(session);

        Ok(AnswerApplied {
            question,
            follow_up_id,
            extracted,
            extraction_error,
            previous_value,
        })
    }

    /// Catalog answers must belong to the block (and areas) the session is in
    fn check_answerable(
        &self,
        session: &InterviewSession,
        question: &Question,
    ) -> Result<(), EngineError> {
        if question.block != session.current_block {
            return Err(EngineError::InvalidState(format!(
                "question {} belongs to the {} block, session is in {}",
                question.id, question.block, session.current_block
            )));
        }
        let area_ok = match question.block {
            InterviewBlock::DeepDive => {
                question.area.is_some()
                    && question.area == session.deep_dive_area.or(session.detected_area)
            }
            InterviewBlock::RiskScan => match (question.area, &session.risk_areas) {
                (Some(area), Some(areas)) => areas.contains(&area),
                _ => false,
            },
            _ => true,
        };
        if !area_ok {
            return Err(EngineError::InvalidState(format!(
                "question {} is not part of this session's {} block",
                question.id, question.block
            )));
        }
        Ok(())
    }

    pub async fn add_answer(
        &self,
        session_id: &str,
        question_id: &str,
        text: &str,
    ) -> Result<(InterviewSession, AnswerApplied), EngineError> {
        let mut session = self.get_session(session_id).await?;
        let applied = self.apply_answer(&mut session, question_id, text)?;
        self.save_session(&session).await?;
        Ok((session, applied))
    }

    /// Re-run every extraction rule over the answer log.
    ///
    /// The log itself is untouched; only extracted data and gaps are rebuilt.
    pub async fn reextract(&self, session_id: &str) -> Result<InterviewSession, EngineError> {
        let mut session = self.get_session(session_id).await?;
        session.extracted_data.clear();
        session.extraction_failures.clear();

        let answers = session.answers.clone();
        for answer in &answers {
            let question = match self.bank.get_question_by_id(&answer.question_id) {
                Ok(q) => q,
                Err(e) => {
                    log::warn!("Session {}: replay skipped answer: {}", session.id, e);
                    continue;
                }
            };
            match extract(question, &answer.text) {
                Ok(value) => session.merge_extracted([(question.field().to_string(), value)]),
                Err(e) => record_gap(&mut session, &e),
            }
        }

        self.refresh(&mut session);
        self.save_session(&session).await?;
        log::info!(
            "Re-extracted {} answers for session {}",
            answers.len(),
            session.id
        );
        Ok(session)
    }

    // ========================================================================
    // Narrow setters
    // ========================================================================

    pub async fn update_extracted_data(
        &self,
        session_id: &str,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<InterviewSession, EngineError> {
        let mut session = self.get_session(session_id).await?;
        session.merge_extracted(fields);
        self.refresh(&mut session);
        self.save_session(&session).await?;
        Ok(session)
    }

    pub async fn set_detected_expertise(
        &self,
        session_id: &str,
        result: ExpertiseResult,
    ) -> Result<InterviewSession, EngineError> {
        let mut session = self.get_session(session_id).await?;
        session.set_detected_expertise(result)?;
        self.refresh(&mut session);
        self.save_session(&session).await?;
        Ok(session)
    }

    pub async fn set_deep_dive_area(
        &self,
        session_id: &str,
        area: Area,
    ) -> Result<InterviewSession, EngineError> {
        let mut session = self.get_session(session_id).await?;
        session.set_deep_dive_area(area);
        self.refresh(&mut session);
        self.save_session(&session).await?;
        Ok(session)
    }

    pub async fn set_risk_scan_areas(
        &self,
        session_id: &str,
        selection: RiskSelection,
        expected: usize,
    ) -> Result<InterviewSession, EngineError> {
        let mut session = self.get_session(session_id).await?;
        session.set_risk_scan_areas(selection, expected)?;
        self.refresh(&mut session);
        self.save_session(&session).await?;
        Ok(session)
    }

    pub async fn advance_to_block(
        &self,
        session_id: &str,
        block: InterviewBlock,
        reason: &str,
    ) -> Result<BlockTransition, EngineError> {
        let mut session = self.get_session(session_id).await?;
        let transition = session.advance_to_block(block, reason, false)?;
        self.refresh(&mut session);
        self.save_session(&session).await?;
        Ok(transition)
    }

    // ========================================================================
    // Derived state
    // ========================================================================

    pub fn report(&self, session: &InterviewSession) -> CompletenessReport {
        self.scorer.report(&self.bank, session)
    }

    /// Recompute completeness, topics and gaps from stored data
    pub fn refresh(&self, session: &mut InterviewSession) {
        let report = self.report(session);
        session.completeness_score = report.score;
        session.topics_covered = report.topics_covered.into_iter().collect();
        session.gaps_identified = report.gaps_identified;
    }

    /// Pure derivation; safe to call any number of times
    pub fn stats_for(&self, session: &InterviewSession) -> SessionStats {
        let report = self.report(session);
        let vague = self.scorer.vague_ratio(&self.bank, session);
        SessionStats {
            session_id: session.id.clone(),
            status: session.status,
            current_block: session.current_block,
            completeness_score: report.score,
            essential_fields_collected: report.essential_fields_collected,
            essential_fields_required: report.essential_fields_required,
            total_fields_collected: report.total_fields_collected,
            confidence: self.scorer.confidence_tier(report.score, vague, 0),
            blocks: report.blocks,
            total_answers: session.answers.len(),
            follow_ups_issued: session.follow_ups_issued,
            elapsed_seconds: session.elapsed_seconds(),
            topics_covered: report.topics_covered,
            gaps_identified: report.gaps_identified,
        }
    }

    pub async fn get_session_stats(&self, session_id: &str) -> Result<SessionStats, EngineError> {
        let session = self.get_session(session_id).await?;
        Ok(self.stats_for(&session))
    }

    // ========================================================================
    // Diagnostics (no expiry; they outlive their session)
    // ========================================================================

    pub async fn save_diagnostic(&self, diagnostic: &Diagnostic) -> Result<(), EngineError> {
        set_json(
            self.kv.as_ref(),
            &format!("{}{}", DIAGNOSTIC_PREFIX, diagnostic.id),
            diagnostic,
            None,
        )
        .await?;
        self.kv
            .set(
                &format!("{}{}", DIAGNOSTIC_INDEX_PREFIX, diagnostic.session_id),
                diagnostic.id.clone(),
                None,
            )
            .await
    }

    pub async fn get_diagnostic(&self, id: &str) -> Result<Option<Diagnostic>, EngineError> {
        get_json(self.kv.as_ref(), &format!("{}{}", DIAGNOSTIC_PREFIX, id)).await
    }

    pub async fn diagnostic_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Diagnostic>, EngineError> {
        match self
            .kv
            .get(&format!("{}{}", DIAGNOSTIC_INDEX_PREFIX, session_id))
            .await?
        {
            Some(id) => self.get_diagnostic(&id).await,
            None => Ok(None),
        }
    }
}

fn record_gap(session: &mut InterviewSession, error: &EngineError) {
    if let EngineError::ExtractionFailure {
        question_id,
        field,
        reason,
    } = error
    {
        session.extraction_failures.push(ExtractionGap {
            question_id: question_id.clone(),
            field: field.clone(),
            reason: reason.clone(),
            at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InterviewConfig, ScoringConfig};
    use crate::models::{FollowUpQuestion, SignalKind};
    use crate::storage::MemoryStore;

    fn store() -> SessionStore {
        SessionStore::new(
            Arc::new(MemoryStore::new()),
            Arc::new(QuestionBank::default()),
            Arc::new(Scorer::new(
                InterviewConfig::default(),
                ScoringConfig::default(),
            )),
            None,
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        let session = store.create_session(SessionContext::default()).await.unwrap();
        let loaded = store.get_session(&session.id).await.unwrap();
        assert_eq!(loaded.current_block, InterviewBlock::Context);
        assert_eq!(loaded.block_question_index, 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let store = store();
        assert!(matches!(
            store.get_session("missing").await,
            Err(EngineError::SessionNotFound(_))
        ));
        assert!(matches!(
            store.delete_session("missing").await,
            Err(EngineError::SessionNotFound(_))
        ));
        assert!(matches!(
            store.get_session_stats("missing").await,
            Err(EngineError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_add_answer_extracts_and_scores() {
        let store = store();
        let session = store.create_session(SessionContext::default()).await.unwrap();
        let (session, applied) = store
            .add_answer(&session.id, "ctx_team_size", "about 40 people")
            .await
            .unwrap();
        assert_eq!(applied.extracted, Some(FieldValue::Number(40.0)));
        assert_eq!(
            session.extracted_data.get("team_size"),
            Some(&FieldValue::Number(40.0))
        );
        assert!(session.completeness_score > 0.0);
        assert_eq!(session.block_question_index, 1);
    }

    #[tokio::test]
    async fn test_extraction_failure_is_recorded_not_thrown() {
        let store = store();
        let session = store.create_session(SessionContext::default()).await.unwrap();
        let (session, applied) = store
            .add_answer(&session.id, "ctx_team_size", "things are kind of slow, I guess")
            .await
            .unwrap();
        assert!(matches!(
            applied.extraction_error,
            Some(EngineError::ExtractionFailure { .. })
        ));
        assert_eq!(session.answers.len(), 1);
        assert_eq!(session.extraction_failures.len(), 1);
        assert!(session.gaps_identified.contains(&"team_size".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_question_is_rejected() {
        let store = store();
        let session = store.create_session(SessionContext::default()).await.unwrap();
        assert!(matches!(
            store.add_answer(&session.id, "nope", "x").await,
            Err(EngineError::QuestionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_answer_for_other_block_is_rejected() {
        let store = store();
        let session = store.create_session(SessionContext::default()).await.unwrap();
        assert!(matches!(
            store.add_answer(&session.id, "exp_strength", "Sales").await,
            Err(EngineError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_follow_up_answer_uses_parent_rule() {
        let store = store();
        let mut session = store.create_session(SessionContext::default()).await.unwrap();
        store
            .apply_answer(&mut session, "ctx_team_size", "a handful")
            .unwrap();
        assert_eq!(session.extraction_failures.len(), 1);
        session.pending_follow_up = Some(FollowUpQuestion {
            id: "ctx_team_size:follow-up:1".to_string(),
            parent_question_id: "ctx_team_size".to_string(),
            text: "Could you put a number on team size?".to_string(),
            signal: SignalKind::Unquantified,
            created_at: Utc::now(),
        });

        let applied = store
            .apply_answer(&mut session, "ctx_team_size:follow-up:1", "8")
            .unwrap();
        assert_eq!(applied.follow_up_id.as_deref(), Some("ctx_team_size:follow-up:1"));
        assert_eq!(
            session.extracted_data.get("team_size"),
            Some(&FieldValue::Number(8.0))
        );
        assert!(session.pending_follow_up.is_none());
        assert!(session.extraction_failures.is_empty());
        assert!(!session.gaps_identified.contains(&"team_size".to_string()));
        assert_eq!(session.answers[1].question_id, "ctx_team_size");
        assert_eq!(session.answers_in_block(InterviewBlock::Context), 1);
    }

    #[tokio::test]
    async fn test_reextract_rebuilds_from_log() {
        let store = store();
        let session = store.create_session(SessionContext::default()).await.unwrap();
        store
            .add_answer(&session.id, "ctx_team_size", "25")
            .await
            .unwrap();
        store
            .update_extracted_data(
                &session.id,
                BTreeMap::from([("team_size".to_string(), FieldValue::Number(999.0))]),
            )
            .await
            .unwrap();

        let replayed = store.reextract(&session.id).await.unwrap();
        assert_eq!(
            replayed.extracted_data.get("team_size"),
            Some(&FieldValue::Number(25.0))
        );
        assert_eq!(replayed.answers.len(), 1);
    }

    #[tokio::test]
    async fn test_context_round_trip_collects_all_essentials() {
        let store = store();
        let session = store.create_session(SessionContext::default()).await.unwrap();
        for (id, text) in [
            ("ctx_company", "We build scheduling software for dental clinics"),
            ("ctx_industry", "SaaS"),
            ("ctx_team_size", "32"),
            ("ctx_revenue", "$1M-$5M"),
            ("ctx_role", "Founder/CEO"),
            ("ctx_stage", "Scaling"),
            ("ctx_goal", "Double recurring revenue"),
        ] {
            store.add_answer(&session.id, id, text).await.unwrap();
        }

        let stats = store.get_session_stats(&session.id).await.unwrap();
        let context = &stats.blocks[&InterviewBlock::Context];
        assert_eq!(
            context.essential_fields_collected,
            context.essential_fields_required
        );
        assert_eq!(context.answers, 7);
    }

    #[tokio::test]
    async fn test_diagnostic_lookup_by_session() {
        let store = store();
        let diagnostic = Diagnostic {
            id: "d1".to_string(),
            session_id: "s1".to_string(),
            generated_at: Utc::now(),
            overall_score: 50,
            confidence: crate::models::ConfidenceTier::Low,
            detected_area: None,
            risk_areas: Vec::new(),
            health_scores: Vec::new(),
            detected_patterns: Vec::new(),
            root_causes: Vec::new(),
            recommendations: Vec::new(),
            roadmap: Vec::new(),
            lead_value: crate::models::LeadValue::Standard,
            completion_metrics: Default::default(),
            degradations: Vec::new(),
        };
        store.save_diagnostic(&diagnostic).await.unwrap();
        assert_eq!(
            store
                .diagnostic_for_session("s1")
                .await
                .unwrap()
                .map(|d| d.id),
            Some("d1".to_string())
        );
        assert!(store.get_diagnostic("d2").await.unwrap().is_none());
    }
}
