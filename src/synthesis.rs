//! Diagnostic synthesis
//!
//! Merges what the interview measured (health rules applied to extracted
//! answers) with the qualitative draft from diagnostic generation. Pure: no
//! IO, no clock other than the generation timestamp.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::interview::{measure_health, AreaGraph, QuestionBank, Scorer};
use crate::models::{
    Area, AreaScore, Diagnostic, DiagnosticDraft, ExpertiseResult, InterviewSession, LeadValue,
    RiskSelection, ScoreSource,
};

/// Weight of the measured score when blending with the model's score
const MEASURED_WEIGHT: f64 = 0.6;

/// Score given to areas nothing is known about
const NEUTRAL_SCORE: f64 = 50.0;

/// Health derived from answers for one area
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaEvidence {
    /// Mean of the area's health contributions, if any were measurable
    pub score: Option<f64>,
    pub data_points: usize,
    /// "topic: value" lines, in catalog order
    pub evidence: Vec<String>,
}

/// Apply every question's health rule to the session's extracted data
pub fn measured_health(bank: &QuestionBank, session: &InterviewSession) -> BTreeMap<Area, AreaEvidence> {
    let mut sums: BTreeMap<Area, (f64, AreaEvidence)> = BTreeMap::new();

    for question in bank.iter() {
        let (Some(area), Some(rule)) = (question.area, &question.health) else {
            continue;
        };
        let Some(value) = session.extracted_data.get(question.field()) else {
            continue;
        };
        let Some(health) = measure_health(rule, value) else {
            continue;
        };
        let (sum, evidence) = sums.entry(area).or_default();
        *sum += health;
        evidence.data_points += 1;
        evidence
            .evidence
            .push(format!("{}: {}", question.topic, value.display()));
    }

    sums.into_iter()
        .map(|(area, (sum, mut evidence))| {
            evidence.score = Some(sum / evidence.data_points as f64);
            (area, evidence)
        })
        .collect()
}

pub struct Synthesizer<'a> {
    bank: &'a QuestionBank,
    graph: &'a AreaGraph,
    scorer: &'a Scorer,
}

impl<'a> Synthesizer<'a> {
    pub fn new(bank: &'a QuestionBank, graph: &'a AreaGraph, scorer: &'a Scorer) -> Self {
        Self {
            bank,
            graph,
            scorer,
        }
    }

    /// Per-area health for every area, in catalog order
    pub fn area_scores(&self, session: &InterviewSession, draft: &DiagnosticDraft) -> Vec<AreaScore> {
        let measured = measured_health(self.bank, session);

        Area::all()
            .iter()
            .map(|area| {
                let evidence = measured.get(area);
                let measured_score = evidence.and_then(|e| e.score);
                let model = draft.health_scores.iter().find(|s| s.area == *area);
                let model_score = model.map(|s| f64::from(s.score.min(100)));

                let (score, source) = match (measured_score, model_score) {
                    (Some(m), Some(s)) => (
                        MEASURED_WEIGHT * m + (1.0 - MEASURED_WEIGHT) * s,
                        ScoreSource::Blended,
                    ),
                    (Some(m), None) => (m, ScoreSource::Measured),
                    (None, Some(s)) => (s, ScoreSource::Model),
                    (None, None) => (NEUTRAL_SCORE, ScoreSource::Default),
                };

                AreaScore {
                    area: *area,
                    score: score.round().clamp(0.0, 100.0) as u8,
                    source,
                    data_points: evidence.map_or(0, |e| e.data_points),
                    weight: self.graph.criticality(*area),
                    summary: model.and_then(|s| s.summary.clone()),
                }
            })
            .collect()
    }

    /// Criticality-weighted mean over areas with any data
    pub fn overall_score(&self, scores: &[AreaScore]) -> u8 {
        let (weighted, total_weight) = scores
            .iter()
            .filter(|s| s.source != ScoreSource::Default)
            .fold((0.0, 0.0), |(w, t), s| {
                (w + f64::from(s.score) * s.weight, t + s.weight)
            });

        if total_weight <= 0.0 {
            return NEUTRAL_SCORE as u8;
        }
        (weighted / total_weight).round().clamp(0.0, 100.0) as u8
    }

    /// Build the final diagnostic.
    ///
    /// `model_degradations` are the recoverable failures of diagnostic
    /// generation; each lowers confidence by one tier.
    pub fn synthesize(
        &self,
        session: &InterviewSession,
        expertise: Option<&ExpertiseResult>,
        risk: Option<&RiskSelection>,
        draft: &DiagnosticDraft,
        lead_value: LeadValue,
        model_degradations: Vec<String>,
    ) -> Diagnostic {
        let health_scores = self.area_scores(session, draft);
        let overall_score = self.overall_score(&health_scores);

        let report = self.scorer.report(self.bank, session);
        let vague = self.scorer.vague_ratio(self.bank, session);
        let confidence = self
            .scorer
            .confidence_tier(report.score, vague, model_degradations.len());

        let mut recommendations = draft.recommendations.clone();
        recommendations.sort_by_key(|r| (r.priority.rank(), r.area.map_or(usize::MAX, |a| a.index())));

        let detected_patterns: Vec<_> = draft
            .detected_patterns
            .iter()
            .filter(|p| !p.evidence.is_empty())
            .cloned()
            .collect();
        let root_causes: Vec<_> = draft
            .root_causes
            .iter()
            .filter(|c| !c.evidence.is_empty())
            .cloned()
            .collect();
        let dropped = draft.detected_patterns.len() - detected_patterns.len()
            + draft.root_causes.len()
            - root_causes.len();
        if dropped > 0 {
            log::debug!(
                "Session {}: dropped {} findings without evidence",
                session.id,
                dropped
            );
        }

        let mut roadmap = draft.roadmap.clone();
        roadmap.sort_by_key(|phase| phase.horizon_days);

        let mut degradations = model_degradations;
        degradations.extend(session.notes.iter().cloned());

        Diagnostic {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            generated_at: Utc::now(),
            overall_score,
            confidence,
            detected_area: expertise.map(|e| e.area).or(session.detected_area),
            risk_areas: risk
                .map(|r| r.areas.clone())
                .or_else(|| session.risk_areas.clone())
                .unwrap_or_default(),
            health_scores,
            detected_patterns,
            root_causes,
            recommendations,
            roadmap,
            lead_value,
            completion_metrics: report.to_metrics(),
            degradations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InterviewConfig, ScoringConfig};
    use crate::models::{
        ConfidenceTier, FieldValue, ModelAreaScore, Pattern, Priority, Recommendation,
        SessionContext,
    };

    fn fixtures() -> (QuestionBank, AreaGraph, Scorer) {
        (
            QuestionBank::default(),
            AreaGraph::default(),
            Scorer::new(InterviewConfig::default(), ScoringConfig::default()),
        )
    }

    fn recommendation(title: &str, priority: Priority, area: Option<Area>) -> Recommendation {
        Recommendation {
            title: title.to_string(),
            description: String::new(),
            priority,
            area,
            expected_impact: None,
        }
    }

    fn score_of(scores: &[AreaScore], area: Area) -> &AreaScore {
        scores.iter().find(|s| s.area == area).unwrap()
    }

    #[test]
    fn test_measured_health_uses_health_rules() {
        let (bank, _, _) = fixtures();
        let mut session = InterviewSession::new(SessionContext::default());
        session.merge_extracted([(
            "risk_finance_runway_months".to_string(),
            FieldValue::Number(24.0),
        )]);
        let measured = measured_health(&bank, &session);
        let finance = &measured[&Area::Finance];
        assert_eq!(finance.data_points, 1);
        assert_eq!(finance.score, Some(100.0));
        assert!(finance.evidence[0].contains("24"));
    }

    #[test]
    fn test_blend_and_default_sources() {
        let (bank, graph, scorer) = fixtures();
        let synthesizer = Synthesizer::new(&bank, &graph, &scorer);
        let mut session = InterviewSession::new(SessionContext::default());
        session.merge_extracted([(
            "risk_finance_runway_months".to_string(),
            FieldValue::Number(24.0),
        )]);
        let draft = DiagnosticDraft {
            health_scores: vec![
                ModelAreaScore {
                    area: Area::Finance,
                    score: 50,
                    summary: Some("ok".to_string()),
                },
                ModelAreaScore {
                    area: Area::Sales,
                    score: 30,
                    summary: None,
                },
            ],
            ..Default::default()
        };

        let scores = synthesizer.area_scores(&session, &draft);
        assert_eq!(scores.len(), Area::all().len());
        let finance = score_of(&scores, Area::Finance);
        assert_eq!(finance.source, ScoreSource::Blended);
        assert_eq!(finance.score, 80);
        assert_eq!(score_of(&scores, Area::Sales).source, ScoreSource::Model);
        assert_eq!(score_of(&scores, Area::People).source, ScoreSource::Default);
    }

    #[test]
    fn test_overall_score_weighted_by_criticality() {
        let (bank, graph, scorer) = fixtures();
        let synthesizer = Synthesizer::new(&bank, &graph, &scorer);
        let session = InterviewSession::new(SessionContext::default());

        // Strong in a peripheral area, weak in the most critical one
        let draft = DiagnosticDraft {
            health_scores: vec![
                ModelAreaScore {
                    area: Area::Marketing,
                    score: 95,
                    summary: None,
                },
                ModelAreaScore {
                    area: Area::Finance,
                    score: 20,
                    summary: None,
                },
            ],
            ..Default::default()
        };
        let scores = synthesizer.area_scores(&session, &draft);
        let overall = synthesizer.overall_score(&scores);
        let flat_mean = (95 + 20) / 2;
        assert!(overall < flat_mean as u8);
    }

    #[test]
    fn test_recommendations_sorted_by_priority_then_area() {
        let (bank, graph, scorer) = fixtures();
        let synthesizer = Synthesizer::new(&bank, &graph, &scorer);
        let session = InterviewSession::new(SessionContext::default());
        let draft = DiagnosticDraft {
            recommendations: vec![
                recommendation("low", Priority::Low, Some(Area::Technology)),
                recommendation("high-people", Priority::High, Some(Area::People)),
                recommendation("critical", Priority::Critical, None),
                recommendation("high-sales", Priority::High, Some(Area::Sales)),
                recommendation("high-sales-2", Priority::High, Some(Area::Sales)),
            ],
            ..Default::default()
        };
        let diagnostic =
            synthesizer.synthesize(&session, None, None, &draft, LeadValue::Standard, Vec::new());
        let titles: Vec<&str> = diagnostic
            .recommendations
            .iter()
            .map(|r| r.title.as_str())
            .collect();
        assert_eq!(
            titles,
            vec!["critical", "high-sales", "high-sales-2", "high-people", "low"]
        );
    }

    #[test]
    fn test_findings_without_evidence_are_dropped() {
        let (bank, graph, scorer) = fixtures();
        let synthesizer = Synthesizer::new(&bank, &graph, &scorer);
        let session = InterviewSession::new(SessionContext::default());
        let draft = DiagnosticDraft {
            detected_patterns: vec![
                Pattern {
                    name: "backed".to_string(),
                    description: String::new(),
                    areas: vec![Area::Sales],
                    evidence: vec!["one customer is 60% of revenue".to_string()],
                },
                Pattern {
                    name: "hunch".to_string(),
                    description: String::new(),
                    areas: vec![Area::Sales],
                    evidence: Vec::new(),
                },
            ],
            ..Default::default()
        };
        let diagnostic =
            synthesizer.synthesize(&session, None, None, &draft, LeadValue::Standard, Vec::new());
        assert_eq!(diagnostic.detected_patterns.len(), 1);
        assert_eq!(diagnostic.detected_patterns[0].name, "backed");
    }

    #[test]
    fn test_degradations_lower_confidence() {
        let bank = QuestionBank::default();
        let graph = AreaGraph::default();
        // Thresholds at zero so the empty session starts at high confidence
        let scorer = Scorer::new(
            InterviewConfig::default(),
            ScoringConfig {
                high_confidence_at: 0.0,
                medium_confidence_at: 0.0,
                ..ScoringConfig::default()
            },
        );
        let synthesizer = Synthesizer::new(&bank, &graph, &scorer);
        let session = InterviewSession::new(SessionContext::default());
        let draft = DiagnosticDraft::default();

        let clean =
            synthesizer.synthesize(&session, None, None, &draft, LeadValue::Standard, Vec::new());
        assert_eq!(clean.confidence, ConfidenceTier::High);
        assert_eq!(clean.overall_score, 50);

        let degraded = synthesizer.synthesize(
            &session,
            None,
            None,
            &draft,
            LeadValue::Standard,
            vec!["model diagnostic skipped".to_string()],
        );
        assert_eq!(degraded.confidence, ConfidenceTier::Medium);
        assert_eq!(degraded.degradations.len(), 1);

        let twice = synthesizer.synthesize(
            &session,
            None,
            None,
            &draft,
            LeadValue::Standard,
            vec!["timeout".to_string(), "schema violation".to_string()],
        );
        assert_eq!(twice.confidence, ConfidenceTier::Low);
    }
}
