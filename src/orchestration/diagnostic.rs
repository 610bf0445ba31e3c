// Diagnostic generation - the model's qualitative read of the whole interview,
// with a deterministic draft built from measured health as the fallback

use serde::Deserialize;
use tera::Context;

use super::parsing::{ParseError, Validate};
use super::prompts::{context_fields, transcript};
use crate::interview::QuestionBank;
use crate::models::{
    Area, DiagnosticDraft, ExtractionGap, InterviewSession, ModelAreaScore, Pattern, Priority,
    Recommendation, ResultSource, RoadmapPhase, RootCause,
};
use crate::synthesis::measured_health;

// ============================================================================
// Model reply
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScoreReply {
    pub area: String,
    pub score: f64,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingReply {
    #[serde(alias = "title")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "affectedAreas")]
    pub areas: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationReply {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub expected_impact: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapReply {
    pub name: String,
    #[serde(alias = "days")]
    pub horizon_days: u32,
    #[serde(default)]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReply {
    #[serde(default, alias = "health_scores")]
    pub health_scores: Vec<HealthScoreReply>,
    #[serde(default, alias = "detected_patterns", alias = "patterns")]
    pub detected_patterns: Vec<FindingReply>,
    #[serde(default, alias = "root_causes")]
    pub root_causes: Vec<FindingReply>,
    pub recommendations: Vec<RecommendationReply>,
    #[serde(default)]
    pub roadmap: Vec<RoadmapReply>,
}

impl Validate for DiagnosticReply {
    fn validate(&self) -> Result<(), ParseError> {
        for score in &self.health_scores {
            score.area.parse::<Area>().map_err(ParseError::Schema)?;
            if !(0.0..=100.0).contains(&score.score) {
                return Err(ParseError::Schema(format!(
                    "health score {} for {} is outside 0-100",
                    score.score, score.area
                )));
            }
        }
        if self.recommendations.is_empty() {
            return Err(ParseError::Schema("no recommendations".to_string()));
        }
        for rec in &self.recommendations {
            rec.priority.parse::<Priority>().map_err(ParseError::Schema)?;
            if let Some(area) = &rec.area {
                area.parse::<Area>().map_err(ParseError::Schema)?;
            }
        }
        Ok(())
    }
}

fn parse_areas(areas: &[String]) -> Vec<Area> {
    areas.iter().filter_map(|a| a.parse().ok()).collect()
}

impl DiagnosticReply {
    pub fn into_draft(self) -> Result<DiagnosticDraft, ParseError> {
        let health_scores = self
            .health_scores
            .into_iter()
            .map(|s| {
                Ok(ModelAreaScore {
                    area: s.area.parse().map_err(ParseError::Schema)?,
                    score: s.score.round() as u8,
                    summary: s.summary,
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        let recommendations = self
            .recommendations
            .into_iter()
            .map(|r| {
                Ok(Recommendation {
                    priority: r.priority.parse().map_err(ParseError::Schema)?,
                    area: r.area.and_then(|a| a.parse().ok()),
                    title: r.title,
                    description: r.description,
                    expected_impact: r.expected_impact,
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        Ok(DiagnosticDraft {
            health_scores,
            detected_patterns: self
                .detected_patterns
                .into_iter()
                .map(|f| Pattern {
                    areas: parse_areas(&f.areas),
                    name: f.name,
                    description: f.description,
                    evidence: f.evidence,
                })
                .collect(),
            root_causes: self
                .root_causes
                .into_iter()
                .map(|f| RootCause {
                    affected_areas: parse_areas(&f.areas),
                    title: f.name,
                    description: f.description,
                    evidence: f.evidence,
                })
                .collect(),
            recommendations,
            roadmap: self
                .roadmap
                .into_iter()
                .map(|p| RoadmapPhase {
                    name: p.name,
                    horizon_days: p.horizon_days,
                    actions: p.actions,
                })
                .collect(),
            source: Some(ResultSource::Model),
        })
    }
}

pub fn schema() -> serde_json::Value {
    let areas: Vec<&str> = Area::all().iter().map(|a| a.as_str()).collect();
    let finding = serde_json::json!({
        "type": "object",
        "required": ["name", "description", "areas", "evidence"],
        "properties": {
            "name": { "type": "string" },
            "description": { "type": "string" },
            "areas": { "type": "array", "items": { "type": "string", "enum": areas } },
            "evidence": { "type": "array", "items": { "type": "string" }, "minItems": 1 }
        }
    });
    serde_json::json!({
        "type": "object",
        "required": ["healthScores", "detectedPatterns", "rootCauses", "recommendations", "roadmap"],
        "properties": {
            "healthScores": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["area", "score"],
                    "properties": {
                        "area": { "type": "string", "enum": areas },
                        "score": { "type": "number", "minimum": 0, "maximum": 100 },
                        "summary": { "type": "string" }
                    }
                }
            },
            "detectedPatterns": { "type": "array", "items": finding },
            "rootCauses": { "type": "array", "items": finding },
            "recommendations": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["title", "description", "priority"],
                    "properties": {
                        "title": { "type": "string" },
                        "description": { "type": "string" },
                        "priority": { "type": "string", "enum": ["critical", "high", "medium", "low"] },
                        "area": { "type": "string", "enum": areas },
                        "expectedImpact": { "type": "string" }
                    }
                }
            },
            "roadmap": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "horizonDays", "actions"],
                    "properties": {
                        "name": { "type": "string" },
                        "horizonDays": { "type": "integer" },
                        "actions": { "type": "array", "items": { "type": "string" } }
                    }
                }
            }
        }
    })
}

pub fn prompt_context(bank: &QuestionBank, session: &InterviewSession) -> Context {
    let mut context = Context::new();
    if let Some(area) = session.detected_area {
        context.insert("detected_area", area.as_str());
    }
    context.insert(
        "risk_areas",
        &session
            .risk_areas
            .iter()
            .flatten()
            .map(|a| a.as_str())
            .collect::<Vec<_>>(),
    );
    context.insert("context", &context_fields(session));
    context.insert("transcript", &transcript(bank, session, &[]));
    context.insert("schema", &schema().to_string());
    context
}

// ============================================================================
// Deterministic fallback
// ============================================================================

/// Standard first move per area when its health is poor
fn area_action(area: Area) -> (&'static str, &'static str) {
    match area {
        Area::Technology => (
            "Reduce key-person dependency in engineering",
            "Document critical systems and pair a second engineer on each one.",
        ),
        Area::Sales => (
            "Diversify the customer base",
            "Set a target ceiling for revenue from the top three accounts and build pipeline outside them.",
        ),
        Area::Marketing => (
            "Add a second acquisition channel",
            "Run a time-boxed experiment on one new channel with a fixed budget and a lead target.",
        ),
        Area::Finance => (
            "Extend runway and tighten forecasting",
            "Build a 13-week cash forecast and identify cost levers worth three months of runway.",
        ),
        Area::Operations => (
            "Make critical processes survive absences",
            "Write runbooks for the five processes that would stop without their owner.",
        ),
        Area::People => (
            "Put a retention plan around key people",
            "Hold stay conversations with each key person and agree a development path.",
        ),
        Area::Strategy => (
            "Re-establish a strategy cadence",
            "Schedule a quarterly strategy review with explicit priorities and kill criteria.",
        ),
    }
}

fn priority_for(score: f64) -> Priority {
    if score < 30.0 {
        Priority::Critical
    } else if score < 50.0 {
        Priority::High
    } else if score < 70.0 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Build a draft from measured health alone
pub fn heuristic(bank: &QuestionBank, session: &InterviewSession) -> DiagnosticDraft {
    let measured = measured_health(bank, session);
    let mut draft = DiagnosticDraft {
        source: Some(ResultSource::Heuristic),
        ..Default::default()
    };

    for (area, evidence) in &measured {
        let Some(score) = evidence.score else {
            continue;
        };
        if score < 50.0 {
            draft.detected_patterns.push(Pattern {
                name: format!("Fragile {}", area.display_name().to_lowercase()),
                description: format!(
                    "Answers about {} point to a structural weakness (health {:.0}/100).",
                    area.display_name().to_lowercase(),
                    score
                ),
                areas: vec![*area],
                evidence: evidence.evidence.clone(),
            });
            draft.root_causes.push(RootCause {
                title: format!("{} health at {:.0}/100", area.display_name(), score),
                description: area.description().to_string(),
                affected_areas: vec![*area],
                evidence: evidence.evidence.clone(),
            });
        }
        if score < 70.0 {
            let (title, description) = area_action(*area);
            draft.recommendations.push(Recommendation {
                title: title.to_string(),
                description: description.to_string(),
                priority: priority_for(score),
                area: Some(*area),
                expected_impact: None,
            });
        }
    }

    // Fields a later answer filled are no longer gaps
    let unfilled: Vec<&ExtractionGap> = session
        .extraction_failures
        .iter()
        .filter(|f| !session.extracted_data.contains_key(&f.field))
        .collect();
    if !unfilled.is_empty() {
        let evidence: Vec<String> = session
            .answers
            .iter()
            .filter(|a| unfilled.iter().any(|f| f.question_id == a.question_id))
            .map(|a| a.text.clone())
            .collect();
        if !evidence.is_empty() {
            draft.detected_patterns.push(Pattern {
                name: "Unmeasured fundamentals".to_string(),
                description: "Several quantitative questions could not be answered with a number."
                    .to_string(),
                areas: Vec::new(),
                evidence,
            });
            draft.recommendations.push(Recommendation {
                title: "Start tracking the missing numbers".to_string(),
                description: format!(
                    "Put a number on: {}.",
                    unfilled
                        .iter()
                        .map(|f| f.field.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                priority: Priority::Medium,
                area: None,
                expected_impact: Some("Makes the next diagnostic measurable".to_string()),
            });
        }
    }

    let titles_for = |priorities: &[Priority]| -> Vec<String> {
        draft
            .recommendations
            .iter()
            .filter(|r| priorities.contains(&r.priority))
            .map(|r| r.title.clone())
            .collect()
    };
    let mut roadmap = vec![
        RoadmapPhase {
            name: "Stabilise".to_string(),
            horizon_days: 30,
            actions: titles_for(&[Priority::Critical, Priority::High]),
        },
        RoadmapPhase {
            name: "Strengthen".to_string(),
            horizon_days: 60,
            actions: titles_for(&[Priority::Medium]),
        },
        RoadmapPhase {
            name: "Sustain".to_string(),
            horizon_days: 90,
            actions: titles_for(&[Priority::Low]),
        },
    ];
    roadmap[2]
        .actions
        .push("Re-run the diagnostic to measure progress".to_string());
    draft.roadmap = roadmap;

    draft
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, FieldValue, InterviewBlock, SessionContext};
    use chrono::Utc;

    #[test]
    fn test_reply_into_draft() {
        let raw = r#"{
            "healthScores": [{"area": "finance", "score": 35.4, "summary": "thin runway"}],
            "detectedPatterns": [{"name": "Cash squeeze", "description": "", "areas": ["finance"], "evidence": ["6 months runway"]}],
            "rootCauses": [{"title": "No forecast", "affectedAreas": ["finance"], "evidence": ["we don't forecast"]}],
            "recommendations": [{"title": "Forecast", "description": "", "priority": "Critical", "area": "finance"}],
            "roadmap": [{"name": "First month", "horizonDays": 30, "actions": ["Forecast"]}]
        }"#;
        let reply: DiagnosticReply = super::super::parsing::parse_reply(raw).unwrap();
        let draft = reply.into_draft().unwrap();
        assert_eq!(draft.health_scores[0].score, 35);
        assert_eq!(draft.root_causes[0].title, "No forecast");
        assert_eq!(draft.root_causes[0].affected_areas, vec![Area::Finance]);
        assert_eq!(draft.recommendations[0].priority, Priority::Critical);
        assert_eq!(draft.source, Some(ResultSource::Model));
    }

    #[test]
    fn test_reply_validation_rejects_bad_priority_and_scores() {
        let bad_priority = r#"{"recommendations": [{"title": "x", "priority": "whenever"}]}"#;
        assert!(super::super::parsing::parse_reply::<DiagnosticReply>(bad_priority).is_err());

        let bad_score = r#"{"healthScores": [{"area": "sales", "score": 140}],
            "recommendations": [{"title": "x", "priority": "low"}]}"#;
        assert!(super::super::parsing::parse_reply::<DiagnosticReply>(bad_score).is_err());

        let empty = r#"{"recommendations": []}"#;
        assert!(super::super::parsing::parse_reply::<DiagnosticReply>(empty).is_err());
    }

    #[test]
    fn test_heuristic_flags_weak_areas_with_evidence() {
        let bank = QuestionBank::default();
        let mut session = InterviewSession::new(SessionContext::default());
        session.merge_extracted([
            ("risk_finance_runway_months".to_string(), FieldValue::Number(4.0)),
            ("risk_sales_concentration_pct".to_string(), FieldValue::Number(15.0)),
        ]);

        let draft = heuristic(&bank, &session);
        assert_eq!(draft.source, Some(ResultSource::Heuristic));
        assert_eq!(draft.detected_patterns.len(), 1);
        assert_eq!(draft.detected_patterns[0].areas, vec![Area::Finance]);
        assert!(!draft.detected_patterns[0].evidence.is_empty());
        assert_eq!(draft.recommendations.len(), 1);
        assert_eq!(draft.recommendations[0].priority, Priority::Critical);
        assert_eq!(draft.roadmap.len(), 3);
        assert_eq!(draft.roadmap[0].actions.len(), 1);
    }

    #[test]
    fn test_heuristic_reports_unmeasured_answers() {
        let bank = QuestionBank::default();
        let mut session = InterviewSession::new(SessionContext::default());
        session.answers.push(Answer {
            question_id: "ctx_team_size".to_string(),
            text: "things are kind of slow, I guess".to_string(),
            timestamp: Utc::now(),
            block: InterviewBlock::Context,
            follow_up_id: None,
        });
        session.extraction_failures.push(ExtractionGap {
            question_id: "ctx_team_size".to_string(),
            field: "team_size".to_string(),
            reason: "no number".to_string(),
            at: Utc::now(),
        });

        let draft = heuristic(&bank, &session);
        assert!(draft
            .detected_patterns
            .iter()
            .any(|p| p.name == "Unmeasured fundamentals"));
        assert!(draft.recommendations[0].description.contains("team_size"));
    }

    #[test]
    fn test_heuristic_skips_gaps_a_later_answer_filled() {
        let bank = QuestionBank::default();
        let mut session = InterviewSession::new(SessionContext::default());
        for text in ["a decent sized team", "around 30 people"] {
            session.answers.push(Answer {
                question_id: "ctx_team_size".to_string(),
                text: text.to_string(),
                timestamp: Utc::now(),
                block: InterviewBlock::Context,
                follow_up_id: None,
            });
        }
        session.extraction_failures.push(ExtractionGap {
            question_id: "ctx_team_size".to_string(),
            field: "team_size".to_string(),
            reason: "no number".to_string(),
            at: Utc::now(),
        });
        // Set directly so the stale failure stays in place
        session
            .extracted_data
            .insert("team_size".to_string(), FieldValue::Number(30.0));

        let draft = heuristic(&bank, &session);
        assert!(!draft
            .detected_patterns
            .iter()
            .any(|p| p.name == "Unmeasured fundamentals"));
        assert!(!draft
            .recommendations
            .iter()
            .any(|r| r.description.contains("team_size")));
    }
}
