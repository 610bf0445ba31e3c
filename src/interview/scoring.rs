// Completeness and confidence scoring - pure functions of session state

use std::collections::{BTreeMap, BTreeSet};

use super::catalog::{GROWTH_STAGES, REVENUE_BANDS};
use super::question_bank::QuestionBank;
use crate::config::{InterviewConfig, ScoringConfig};
use crate::models::{
    BlockCompleteness, CompletionMetrics, ConfidenceTier, FieldValue, HealthRule,
    InterviewBlock, InterviewSession, LeadValue,
};

/// Everything derived from a session's extracted data
#[derive(Debug, Clone, PartialEq)]
pub struct CompletenessReport {
    /// 0-100, weighted by block
    pub score: f64,
    pub essential_fields_collected: usize,
    pub essential_fields_required: usize,
    pub total_fields_collected: usize,
    pub blocks: BTreeMap<InterviewBlock, BlockCompleteness>,
    pub topics_covered: Vec<String>,
    pub gaps_identified: Vec<String>,
}

impl CompletenessReport {
    pub fn block(&self, block: InterviewBlock) -> BlockCompleteness {
        self.blocks.get(&block).cloned().unwrap_or_default()
    }

    pub fn to_metrics(&self) -> CompletionMetrics {
        CompletionMetrics {
            completeness_score: self.score,
            essential_fields_collected: self.essential_fields_collected,
            total_fields_collected: self.total_fields_collected,
            topics_covered: self.topics_covered.clone(),
            gaps_identified: self.gaps_identified.clone(),
        }
    }
}

pub struct Scorer {
    interview: InterviewConfig,
    scoring: ScoringConfig,
}

impl Scorer {
    pub fn new(interview: InterviewConfig, scoring: ScoringConfig) -> Self {
        Self { interview, scoring }
    }

    /// Essential fields a block requires, and the number of slots not yet
    /// resolved because the block's areas are unknown
    fn required_fields<'a>(
        &self,
        bank: &'a QuestionBank,
        session: &InterviewSession,
        block: InterviewBlock,
    ) -> (Vec<&'a str>, usize) {
        let persona = session.persona();
        match block {
            InterviewBlock::DeepDive => match session.deep_dive_area.or(session.detected_area) {
                Some(area) => (
                    QuestionBank::essential_fields(&bank.askable(block, Some(area), None, persona)),
                    0,
                ),
                None => (Vec::new(), bank.max_deep_dive_essentials()),
            },
            InterviewBlock::RiskScan => match &session.risk_areas {
                Some(areas) => (
                    QuestionBank::essential_fields(&bank.askable(block, None, Some(areas), persona)),
                    0,
                ),
                None => (Vec::new(), self.interview.risk_area_count),
            },
            _ => (
                QuestionBank::essential_fields(&bank.askable(block, None, None, persona)),
                0,
            ),
        }
    }

    /// Derive completeness, per-block progress, topics and gaps
    pub fn report(&self, bank: &QuestionBank, session: &InterviewSession) -> CompletenessReport {
        let mut blocks = BTreeMap::new();
        let mut weighted_collected = 0.0;
        let mut weighted_required = 0.0;
        let mut collected_total = 0;
        let mut required_total = 0;
        let mut gaps = Vec::new();

        for block in InterviewBlock::all() {
            let (fields, unresolved) = self.required_fields(bank, session, *block);
            let collected = fields
                .iter()
                .filter(|f| session.extracted_data.contains_key(**f))
                .count();
            let required = fields.len() + unresolved;
            let weight = self.scoring.block_weights.get(*block);

            weighted_collected += weight * collected as f64;
            weighted_required += weight * required as f64;
            collected_total += collected;
            required_total += required;

            gaps.extend(
                fields
                    .iter()
                    .filter(|f| !session.extracted_data.contains_key(**f))
                    .map(|f| f.to_string()),
            );
            if unresolved > 0 {
                gaps.push(format!("{}: areas not yet selected", block));
            }

            blocks.insert(
                *block,
                BlockCompleteness {
                    essential_fields_collected: collected,
                    essential_fields_required: required,
                    score: percent(collected as f64, required as f64),
                    answers: session.answers_in_block(*block),
                },
            );
        }
        gaps.extend(session.notes.iter().cloned());

        let topics: BTreeSet<String> = bank
            .iter()
            .filter(|q| session.extracted_data.contains_key(q.field()))
            .map(|q| q.topic.clone())
            .collect();

        CompletenessReport {
            score: percent(weighted_collected, weighted_required),
            essential_fields_collected: collected_total,
            essential_fields_required: required_total,
            total_fields_collected: session.extracted_data.len(),
            blocks,
            topics_covered: topics.into_iter().collect(),
            gaps_identified: gaps,
        }
    }

    /// Share of free-text answers shorter than the minimum length
    pub fn vague_ratio(&self, bank: &QuestionBank, session: &InterviewSession) -> f64 {
        let free_text: Vec<usize> = session
            .answers
            .iter()
            .filter(|a| {
                bank.get_question_by_id(&a.question_id)
                    .map(|q| q.is_free_text())
                    .unwrap_or(false)
            })
            .map(|a| a.text.trim().chars().count())
            .collect();

        if free_text.is_empty() {
            return 0.0;
        }
        let short = free_text
            .iter()
            .filter(|len| **len < self.interview.min_answer_chars)
            .count();
        short as f64 / free_text.len() as f64
    }

    /// Step function of completeness, lowered for vague answers and each visible degradation
    pub fn confidence_tier(
        &self,
        completeness: f64,
        vague_ratio: f64,
        degradations: usize,
    ) -> ConfidenceTier {
        let base = if completeness >= self.scoring.high_confidence_at {
            ConfidenceTier::High
        } else if completeness >= self.scoring.medium_confidence_at {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        };

        let vagueness_penalty = if vague_ratio >= self.scoring.vague_ratio_two_tiers {
            2
        } else if vague_ratio > self.scoring.vague_ratio_one_tier {
            1
        } else {
            0
        };

        base.downgrade(vagueness_penalty + degradations)
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 100.0;
    }
    (100.0 * part / whole).clamp(0.0, 100.0)
}

/// Map an extracted value onto a 0-100 health contribution
pub fn measure_health(rule: &HealthRule, value: &FieldValue) -> Option<f64> {
    match rule {
        HealthRule::LowerIsBetter { good, bad } => {
            let v = value.as_number()?;
            Some(interpolate(v, *bad, *good))
        }
        HealthRule::HigherIsBetter { good, bad } => {
            let v = value.as_number()?;
            Some(interpolate(v, *bad, *good))
        }
        HealthRule::ChoiceScores { scores } => {
            let text = value.as_text()?;
            scores
                .iter()
                .find(|(option, _)| option.eq_ignore_ascii_case(text))
                .map(|(_, score)| f64::from(*score))
        }
    }
}

/// Linear scale where `bad` maps to 0 and `good` to 100, in either direction
fn interpolate(value: f64, bad: f64, good: f64) -> f64 {
    if (good - bad).abs() < f64::EPSILON {
        return if value == good { 100.0 } else { 0.0 };
    }
    (100.0 * (value - bad) / (good - bad)).clamp(0.0, 100.0)
}

/// Estimate lead value from revenue band, team size and growth stage
pub fn assess_lead_value(data: &BTreeMap<String, FieldValue>) -> LeadValue {
    let revenue = data.get("revenue_band").and_then(|v| v.as_text());
    let team = data.get("team_size").and_then(|v| v.as_number());
    let stage = data.get("growth_stage").and_then(|v| v.as_text());

    let smallest_band = REVENUE_BANDS[0];
    let pre_revenue = GROWTH_STAGES[0];

    if stage == Some(pre_revenue) {
        return LeadValue::Low;
    }
    if revenue == Some(smallest_band) && team.map_or(false, |t| t < 5.0) {
        return LeadValue::Low;
    }

    let large_band = revenue
        .and_then(|r| REVENUE_BANDS.iter().position(|b| *b == r))
        .map_or(false, |i| i >= 2);
    if large_band || team.map_or(false, |t| t >= 50.0) {
        return LeadValue::High;
    }
    LeadValue::Standard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Area, SessionContext};

    fn scorer() -> Scorer {
        Scorer::new(InterviewConfig::default(), ScoringConfig::default())
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn test_empty_session_scores_zero_with_fixed_denominator() {
        let bank = QuestionBank::default();
        let session = InterviewSession::new(SessionContext::default());
        let report = scorer().report(&bank, &session);
        assert_eq!(report.score, 0.0);
        // 7 context + 4 expertise + 4 deep-dive slots + 3 risk-scan slots
        assert_eq!(report.essential_fields_required, 18);
        assert!(report
            .gaps_identified
            .iter()
            .any(|g| g.starts_with("deep-dive")));
    }

    #[test]
    fn test_denominator_stable_when_areas_resolve() {
        let bank = QuestionBank::default();
        let mut session = InterviewSession::new(SessionContext::default());
        let before = scorer().report(&bank, &session).essential_fields_required;
        session.detected_area = Some(Area::Technology);
        session.risk_areas = Some(vec![Area::Finance, Area::Sales, Area::Operations]);
        let after = scorer().report(&bank, &session).essential_fields_required;
        assert_eq!(before, after);
    }

    #[test]
    fn test_context_weighs_more_than_risk_scan() {
        let bank = QuestionBank::default();
        let mut a = InterviewSession::new(SessionContext::default());
        a.merge_extracted([("team_size".to_string(), FieldValue::Number(10.0))]);

        let mut b = InterviewSession::new(SessionContext::default());
        b.risk_areas = Some(vec![Area::Finance, Area::Sales, Area::Operations]);
        b.merge_extracted([(
            "risk_finance_runway_months".to_string(),
            FieldValue::Number(10.0),
        )]);

        let s = scorer();
        assert!(s.report(&bank, &a).score > s.report(&bank, &b).score);
    }

    #[test]
    fn test_score_monotone_as_fields_accumulate() {
        let bank = QuestionBank::default();
        let s = scorer();
        let mut session = InterviewSession::new(SessionContext::default());
        let mut last = s.report(&bank, &session).score;
        for (field, value) in [
            ("company_description", text("We sell scheduling software to clinics")),
            ("industry", text("SaaS")),
            ("team_size", FieldValue::Number(25.0)),
            ("team_size", FieldValue::Number(30.0)),
            ("revenue_band", text("$1M-$5M")),
        ] {
            session.merge_extracted([(field.to_string(), value)]);
            let score = s.report(&bank, &session).score;
            assert!(score >= last);
            last = score;
        }
        assert_eq!(s.report(&bank, &session), s.report(&bank, &session));
    }

    #[test]
    fn test_topics_and_block_counts() {
        let bank = QuestionBank::default();
        let mut session = InterviewSession::new(SessionContext::default());
        session.merge_extracted([
            ("industry".to_string(), text("SaaS")),
            ("team_size".to_string(), FieldValue::Number(12.0)),
        ]);
        let report = scorer().report(&bank, &session);
        assert_eq!(report.topics_covered, vec!["industry", "team size"]);
        let context = report.block(InterviewBlock::Context);
        assert_eq!(context.essential_fields_collected, 2);
        assert_eq!(context.essential_fields_required, 7);
    }

    #[test]
    fn test_confidence_tiers_and_penalties() {
        let s = scorer();
        assert_eq!(s.confidence_tier(90.0, 0.0, 0), ConfidenceTier::High);
        assert_eq!(s.confidence_tier(60.0, 0.0, 0), ConfidenceTier::Medium);
        assert_eq!(s.confidence_tier(20.0, 0.0, 0), ConfidenceTier::Low);
        assert_eq!(s.confidence_tier(100.0, 0.25, 0), ConfidenceTier::Medium);
        assert_eq!(s.confidence_tier(100.0, 0.5, 0), ConfidenceTier::Low);
        assert_eq!(s.confidence_tier(100.0, 0.2, 0), ConfidenceTier::High);
        assert_eq!(s.confidence_tier(100.0, 0.0, 1), ConfidenceTier::Medium);
    }

    #[test]
    fn test_confidence_monotone_in_completeness() {
        let s = scorer();
        let mut last = ConfidenceTier::Low;
        for score in (0..=100).step_by(5) {
            let tier = s.confidence_tier(score as f64, 0.0, 0);
            assert!(tier >= last);
            last = tier;
        }
    }

    #[test]
    fn test_measure_health() {
        let lower = HealthRule::LowerIsBetter { good: 10.0, bad: 30.0 };
        assert_eq!(measure_health(&lower, &FieldValue::Number(5.0)), Some(100.0));
        assert_eq!(measure_health(&lower, &FieldValue::Number(20.0)), Some(50.0));
        assert_eq!(measure_health(&lower, &FieldValue::Number(40.0)), Some(0.0));

        let higher = HealthRule::HigherIsBetter { good: 18.0, bad: 6.0 };
        assert_eq!(measure_health(&higher, &FieldValue::Number(12.0)), Some(50.0));

        let choice = HealthRule::ChoiceScores {
            scores: vec![("Weekly".to_string(), 75)],
        };
        assert_eq!(measure_health(&choice, &text("weekly")), Some(75.0));
        assert_eq!(measure_health(&choice, &FieldValue::Number(1.0)), None);
    }

    #[test]
    fn test_lead_value() {
        let mut data = BTreeMap::new();
        data.insert("revenue_band".to_string(), text("< $1M"));
        data.insert("team_size".to_string(), FieldValue::Number(3.0));
        assert_eq!(assess_lead_value(&data), LeadValue::Low);

        data.insert("team_size".to_string(), FieldValue::Number(12.0));
        assert_eq!(assess_lead_value(&data), LeadValue::Standard);

        data.insert("revenue_band".to_string(), text("$5M-$20M"));
        assert_eq!(assess_lead_value(&data), LeadValue::High);

        data.insert("growth_stage".to_string(), text("Pre-revenue"));
        assert_eq!(assess_lead_value(&data), LeadValue::Low);
    }
}
