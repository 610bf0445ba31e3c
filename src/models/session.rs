// Interview session models - per-respondent mutable state and derived statistics

use super::state_machine::transition_block;
use super::{Answer, Area, FieldValue, FollowUpQuestion, InterviewBlock, Persona};
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Field that carries the respondent's stated role
pub const ROLE_FIELD: &str = "respondent_role";

// ============================================================================
// Session Inputs and Lifecycle
// ============================================================================

/// Initial context supplied by the caller when an interview starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// Known persona, if the caller already knows who is answering
    #[serde(default)]
    pub persona: Option<Persona>,
    /// Where the lead came from (landing page, campaign, ...)
    #[serde(default)]
    pub source: Option<String>,
    /// Arbitrary caller metadata, carried through to the diagnostic
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

/// Where a model-derived result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Model,
    Heuristic,
    Graph,
}

/// Outcome of expertise detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpertiseResult {
    pub area: Area,
    /// 0.0 - 1.0
    pub confidence: f64,
    pub reasoning: String,
    pub source: ResultSource,
}

/// Outcome of risk-area selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSelection {
    pub areas: Vec<Area>,
    pub reasoning: String,
    pub source: ResultSource,
}

/// A recorded move from one block to the next
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockTransition {
    pub from: InterviewBlock,
    pub to: InterviewBlock,
    /// Human-readable reason, e.g. "context complete, moving to expertise"
    pub reason: String,
    /// True when the block's catalog ran out before its criteria were met
    pub forced: bool,
    pub at: DateTime<Utc>,
}

/// An answer whose extraction rule could not produce a value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionGap {
    pub question_id: String,
    pub field: String,
    pub reason: String,
    pub at: DateTime<Utc>,
}

// ============================================================================
// Session
// ============================================================================

/// Per-interview state, owned by the engine for its lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub context: SessionContext,
    pub status: SessionStatus,
    pub current_block: InterviewBlock,
    /// Catalog questions answered in the current block
    pub block_question_index: usize,
    pub answers: Vec<Answer>,
    pub extracted_data: BTreeMap<String, FieldValue>,
    pub detected_area: Option<Area>,
    pub expertise: Option<ExpertiseResult>,
    pub deep_dive_area: Option<Area>,
    pub risk_areas: Option<Vec<Area>>,
    pub risk_selection: Option<RiskSelection>,
    pub completeness_score: f64,
    pub topics_covered: BTreeSet<String>,
    pub gaps_identified: Vec<String>,
    pub extraction_failures: Vec<ExtractionGap>,
    /// Forced transitions and other visible degradations
    pub notes: Vec<String>,
    pub transitions: Vec<BlockTransition>,
    pub pending_follow_up: Option<FollowUpQuestion>,
    pub follow_ups_issued: u32,
    pub diagnostic_id: Option<String>,
}

impl InterviewSession {
    pub fn new(context: SessionContext) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: now,
            updated_at: now,
            context,
            status: SessionStatus::Active,
            current_block: InterviewBlock::Context,
            block_question_index: 0,
            answers: Vec::new(),
            extracted_data: BTreeMap::new(),
            detected_area: None,
            expertise: None,
            deep_dive_area: None,
            risk_areas: None,
            risk_selection: None,
            completeness_score: 0.0,
            topics_covered: BTreeSet::new(),
            gaps_identified: Vec::new(),
            extraction_failures: Vec::new(),
            notes: Vec::new(),
            transitions: Vec::new(),
            pending_follow_up: None,
            follow_ups_issued: 0,
            diagnostic_id: None,
        }
    }

    /// Persona from the caller's context, else derived from the stated role
    pub fn persona(&self) -> Option<Persona> {
        self.context.persona.or_else(|| {
            self.extracted_data
                .get(ROLE_FIELD)
                .and_then(|v| v.as_text())
                .and_then(Persona::from_role)
        })
    }

    /// Ids of catalog questions that have a direct (non-follow-up) answer
    pub fn answered_question_ids(&self) -> HashSet<&str> {
        self.answers
            .iter()
            .filter(|a| !a.is_follow_up())
            .map(|a| a.question_id.as_str())
            .collect()
    }

    /// Number of distinct catalog questions answered while in `block`
    pub fn answers_in_block(&self, block: InterviewBlock) -> usize {
        self.answers
            .iter()
            .filter(|a| !a.is_follow_up() && a.block == block)
            .map(|a| a.question_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Move to the next block. The only mutator of `current_block`.
    pub fn advance_to_block(
        &mut self,
        block: InterviewBlock,
        reason: impl Into<String>,
        forced: bool,
    ) -> Result<BlockTransition, EngineError> {
        let from = self.current_block;
        let to = transition_block(from, block)?;
        let transition = BlockTransition {
            from,
            to,
            reason: reason.into(),
            forced,
            at: Utc::now(),
        };

        self.current_block = to;
        self.block_question_index = 0;
        if forced {
            self.notes.push(format!(
                "{} block ended before its completion criteria were met",
                from
            ));
        }
        self.transitions.push(transition.clone());
        self.touch();
        Ok(transition)
    }

    /// Record the detected expertise. Allowed once, only while in the expertise block.
    pub fn set_detected_expertise(&mut self, result: ExpertiseResult) -> Result<(), EngineError> {
        if self.detected_area.is_some() {
            return Err(EngineError::AlreadySet("detected area".to_string()));
        }
        if self.current_block != InterviewBlock::Expertise {
            return Err(EngineError::InvalidState(format!(
                "expertise can only be detected from the expertise block (current: {})",
                self.current_block
            )));
        }
        self.detected_area = Some(result.area);
        self.expertise = Some(result);
        self.touch();
        Ok(())
    }

    pub fn set_deep_dive_area(&mut self, area: Area) {
        self.deep_dive_area = Some(area);
        self.touch();
    }

    /// Record the selected risk areas. Exactly `expected` distinct areas are required.
    pub fn set_risk_scan_areas(
        &mut self,
        selection: RiskSelection,
        expected: usize,
    ) -> Result<(), EngineError> {
        let distinct: BTreeSet<Area> = selection.areas.iter().copied().collect();
        if selection.areas.len() != expected || distinct.len() != expected {
            return Err(EngineError::InvalidState(format!(
                "expected {} distinct risk areas, got {:?}",
                expected, selection.areas
            )));
        }
        if self.risk_areas.is_some() {
            return Err(EngineError::AlreadySet("risk areas".to_string()));
        }
        self.risk_areas = Some(selection.areas.clone());
        self.risk_selection = Some(selection);
        self.touch();
        Ok(())
    }

    /// Merge extracted values, last write wins per field.
    ///
    /// A filled field drops its earlier extraction failures.
    pub fn merge_extracted(&mut self, fields: impl IntoIterator<Item = (String, FieldValue)>) {
        for (field, value) in fields {
            self.extraction_failures.retain(|f| f.field != field);
            self.extracted_data.insert(field, value);
        }
        self.touch();
    }

    pub fn elapsed_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Derived Statistics
// ============================================================================

/// Completeness of one block's essential fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCompleteness {
    pub essential_fields_collected: usize,
    pub essential_fields_required: usize,
    /// 0-100
    pub score: f64,
    pub answers: usize,
}

/// Metrics the report-rendering layer depends on. Do not reshape without a version bump.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionMetrics {
    pub completeness_score: f64,
    pub essential_fields_collected: usize,
    pub total_fields_collected: usize,
    pub topics_covered: Vec<String>,
    pub gaps_identified: Vec<String>,
}

/// Pure derivation of a session's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub session_id: String,
    pub status: SessionStatus,
    pub current_block: InterviewBlock,
    pub completeness_score: f64,
    pub essential_fields_collected: usize,
    pub essential_fields_required: usize,
    pub total_fields_collected: usize,
    pub blocks: BTreeMap<InterviewBlock, BlockCompleteness>,
    pub total_answers: usize,
    pub follow_ups_issued: u32,
    pub confidence: super::ConfidenceTier,
    pub elapsed_seconds: i64,
    pub topics_covered: Vec<String>,
    pub gaps_identified: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expertise(area: Area) -> ExpertiseResult {
        ExpertiseResult {
            area,
            confidence: 0.8,
            reasoning: "test".to_string(),
            source: ResultSource::Heuristic,
        }
    }

    #[test]
    fn test_new_session_starts_in_context() {
        let session = InterviewSession::new(SessionContext::default());
        assert_eq!(session.current_block, InterviewBlock::Context);
        assert_eq!(session.block_question_index, 0);
        assert!(session.answers.is_empty());
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[test]
    fn test_advance_resets_index_and_records_transition() {
        let mut session = InterviewSession::new(SessionContext::default());
        session.block_question_index = 7;
        let transition = session
            .advance_to_block(InterviewBlock::Expertise, "context complete", false)
            .unwrap();
        assert_eq!(transition.from, InterviewBlock::Context);
        assert_eq!(session.current_block, InterviewBlock::Expertise);
        assert_eq!(session.block_question_index, 0);
        assert_eq!(session.transitions.len(), 1);
        assert!(session.notes.is_empty());
    }

    #[test]
    fn test_advance_rejects_same_block_and_backtracking() {
        let mut session = InterviewSession::new(SessionContext::default());
        assert!(session
            .advance_to_block(InterviewBlock::Context, "again", false)
            .is_err());
        session
            .advance_to_block(InterviewBlock::Expertise, "ok", false)
            .unwrap();
        assert!(session
            .advance_to_block(InterviewBlock::Context, "back", false)
            .is_err());
    }

    #[test]
    fn test_forced_advance_records_note() {
        let mut session = InterviewSession::new(SessionContext::default());
        session
            .advance_to_block(InterviewBlock::Expertise, "catalog exhausted", true)
            .unwrap();
        assert_eq!(session.notes.len(), 1);
        assert!(session.notes[0].contains("context"));
    }

    #[test]
    fn test_detected_expertise_set_once_in_expertise_block() {
        let mut session = InterviewSession::new(SessionContext::default());
        assert!(session
            .set_detected_expertise(expertise(Area::Sales))
            .is_err());

        session
            .advance_to_block(InterviewBlock::Expertise, "ok", false)
            .unwrap();
        session
            .set_detected_expertise(expertise(Area::Sales))
            .unwrap();
        assert_eq!(session.detected_area, Some(Area::Sales));

        let again = session.set_detected_expertise(expertise(Area::Finance));
        assert!(matches!(again, Err(EngineError::AlreadySet(_))));
        assert_eq!(session.detected_area, Some(Area::Sales));
    }

    #[test]
    fn test_risk_areas_require_exact_distinct_count() {
        let mut session = InterviewSession::new(SessionContext::default());
        let dup = RiskSelection {
            areas: vec![Area::Sales, Area::Sales, Area::Finance],
            reasoning: String::new(),
            source: ResultSource::Graph,
        };
        assert!(session.set_risk_scan_areas(dup, 3).is_err());

        let ok = RiskSelection {
            areas: vec![Area::Sales, Area::Finance, Area::People],
            reasoning: String::new(),
            source: ResultSource::Graph,
        };
        session.set_risk_scan_areas(ok, 3).unwrap();
        assert_eq!(session.risk_areas.as_ref().map(|a| a.len()), Some(3));
    }

    #[test]
    fn test_persona_falls_back_to_stated_role() {
        let mut session = InterviewSession::new(SessionContext::default());
        assert_eq!(session.persona(), None);
        session.merge_extracted([(
            ROLE_FIELD.to_string(),
            FieldValue::Text("CTO/Technical lead".to_string()),
        )]);
        assert_eq!(session.persona(), Some(Persona::Technical));
    }

    #[test]
    fn test_completion_metrics_field_names() {
        let metrics = CompletionMetrics::default();
        let json = serde_json::to_value(&metrics).unwrap();
        for key in [
            "completenessScore",
            "essentialFieldsCollected",
            "totalFieldsCollected",
            "topicsCovered",
            "gapsIdentified",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }
}
