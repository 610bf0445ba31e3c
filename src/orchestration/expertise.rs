// Expertise detection - which area the respondent knows best

use serde::Deserialize;
use tera::Context;

use super::parsing::{ParseError, Validate};
use super::prompts::{transcript, TranscriptEntry};
use crate::interview::QuestionBank;
use crate::models::{Area, ExpertiseResult, InterviewBlock, InterviewSession, ResultSource, ROLE_FIELD};

/// Keywords that point at an area, matched against lowercased answers
const AREA_KEYWORDS: &[(Area, &[&str])] = &[
    (
        Area::Technology,
        &[
            "engineering", "software", "code", "platform", "architecture", "infrastructure",
            "developer", "deploy", "technical", "product", "api", "cloud", "data",
        ],
    ),
    (
        Area::Sales,
        &[
            "sales", "selling", "pipeline", "deal", "quota", "prospect", "account", "closing",
            "customer", "crm", "revenue",
        ],
    ),
    (
        Area::Marketing,
        &[
            "marketing", "brand", "campaign", "seo", "content", "leads", "funnel", "advertising",
            "positioning", "social",
        ],
    ),
    (
        Area::Finance,
        &[
            "finance", "financial", "cash", "budget", "accounting", "margin", "forecast", "runway",
            "investor", "fundraising", "p&l",
        ],
    ),
    (
        Area::Operations,
        &[
            "operations", "process", "supply", "logistics", "fulfilment", "fulfillment",
            "delivery", "workflow", "vendor", "quality", "efficiency",
        ],
    ),
    (
        Area::People,
        &[
            "hiring", "recruiting", "people", "culture", "team", "talent", "retention", "hr",
            "onboarding", "coaching", "manager",
        ],
    ),
    (
        Area::Strategy,
        &[
            "strategy", "vision", "direction", "board", "planning", "roadmap", "priorities",
            "market", "competition", "acquisition",
        ],
    ),
];

/// Model reply shape
#[derive(Debug, Clone, Deserialize)]
pub struct ExpertiseReply {
    pub area: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl Validate for ExpertiseReply {
    fn validate(&self) -> Result<(), ParseError> {
        self.area.parse::<Area>().map_err(ParseError::Schema)?;
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ParseError::Schema(format!(
                "confidence {} is outside 0-1",
                self.confidence
            )));
        }
        Ok(())
    }
}

impl ExpertiseReply {
    /// Convert a validated reply
    pub fn into_result(self) -> Result<ExpertiseResult, ParseError> {
        Ok(ExpertiseResult {
            area: self.area.parse().map_err(ParseError::Schema)?,
            confidence: self.confidence,
            reasoning: self.reasoning,
            source: ResultSource::Model,
        })
    }
}

pub fn schema() -> serde_json::Value {
    let areas: Vec<&str> = Area::all().iter().map(|a| a.as_str()).collect();
    serde_json::json!({
        "type": "object",
        "required": ["area", "confidence", "reasoning"],
        "properties": {
            "area": { "type": "string", "enum": areas },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "reasoning": { "type": "string" }
        }
    })
}

fn expertise_transcript(bank: &QuestionBank, session: &InterviewSession) -> Vec<TranscriptEntry> {
    transcript(bank, session, &[InterviewBlock::Expertise])
}

pub fn prompt_context(bank: &QuestionBank, session: &InterviewSession) -> Context {
    let mut context = Context::new();
    if let Some(role) = session.extracted_data.get(ROLE_FIELD) {
        context.insert("role", &role.display());
    }
    context.insert("transcript", &expertise_transcript(bank, session));
    context.insert(
        "areas",
        &Area::all().iter().map(|a| a.as_str()).collect::<Vec<_>>(),
    );
    context.insert("schema", &schema().to_string());
    context
}

/// Area implied by a stated role, if any
fn area_from_role(role: &str) -> Option<Area> {
    let role = role.to_lowercase();
    if role.contains("cto") || role.contains("technical") || role.contains("engineer") {
        Some(Area::Technology)
    } else if role.contains("sales") {
        Some(Area::Sales)
    } else if role.contains("marketing") {
        Some(Area::Marketing)
    } else if role.contains("finance") || role.contains("cfo") {
        Some(Area::Finance)
    } else if role.contains("operations") || role.contains("coo") {
        Some(Area::Operations)
    } else if role.contains("hr") || role.contains("people") {
        Some(Area::People)
    } else if role.contains("founder") || role.contains("ceo") {
        Some(Area::Strategy)
    } else {
        None
    }
}

/// Keyword count per area over the expertise answers, in catalog order
fn keyword_hits(text: &str) -> Vec<(Area, usize)> {
    let text = text.to_lowercase();
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric() && c != '&')
        .filter(|w| !w.is_empty())
        .collect();

    AREA_KEYWORDS
        .iter()
        .map(|(area, keywords)| {
            let hits = words
                .iter()
                .filter(|w| keywords.iter().any(|k| w.starts_with(k)))
                .count();
            (*area, hits)
        })
        .collect()
}

/// Deterministic fallback: keyword matching plus the stated role as a tiebreak
pub fn heuristic(session: &InterviewSession) -> ExpertiseResult {
    let text: String = session
        .answers
        .iter()
        .filter(|a| a.block == InterviewBlock::Expertise)
        .map(|a| a.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let role_area = session
        .extracted_data
        .get(ROLE_FIELD)
        .and_then(|v| v.as_text())
        .and_then(area_from_role);

    let mut hits = keyword_hits(&text);
    if let Some(area) = role_area {
        if let Some(entry) = hits.iter_mut().find(|(a, _)| *a == area) {
            entry.1 += 1;
        }
    }

    let total: usize = hits.iter().map(|(_, n)| n).sum();
    let (area, top) = hits
        .iter()
        .copied()
        .fold((Area::Strategy, 0), |best, (area, n)| if n > best.1 { (area, n) } else { best });

    if total == 0 {
        return ExpertiseResult {
            area: Area::Strategy,
            confidence: 0.2,
            reasoning: "No area-specific language in the answers; defaulting to strategy"
                .to_string(),
            source: ResultSource::Heuristic,
        };
    }

    let share = top as f64 / total as f64;
    ExpertiseResult {
        area,
        confidence: (0.3 + 0.5 * share).min(0.8),
        reasoning: format!(
            "{} of {} area keywords in the expertise answers point to {}",
            top, total, area
        ),
        source: ResultSource::Heuristic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, FieldValue, SessionContext};
    use chrono::Utc;

    fn session_with(answers: &[&str]) -> InterviewSession {
        let mut session = InterviewSession::new(SessionContext::default());
        for text in answers {
            session.answers.push(Answer {
                question_id: "exp_strength".to_string(),
                text: text.to_string(),
                timestamp: Utc::now(),
                block: InterviewBlock::Expertise,
                follow_up_id: None,
            });
        }
        session
    }

    #[test]
    fn test_heuristic_picks_dominant_area() {
        let session = session_with(&[
            "I spent ten years in engineering leadership, mostly platform and infrastructure work",
            "Most weeks I review architecture and deploy pipelines",
        ]);
        let result = heuristic(&session);
        assert_eq!(result.area, Area::Technology);
        assert_eq!(result.source, ResultSource::Heuristic);
        assert!(result.confidence > 0.5);
    }

    #[test]
    fn test_heuristic_uses_role_when_answers_are_silent() {
        let mut session = session_with(&["I mostly just keep things going"]);
        session.merge_extracted([(
            ROLE_FIELD.to_string(),
            FieldValue::Text("Finance lead".to_string()),
        )]);
        assert_eq!(heuristic(&session).area, Area::Finance);
    }

    #[test]
    fn test_heuristic_default() {
        let result = heuristic(&session_with(&["hard to say"]));
        assert_eq!(result.area, Area::Strategy);
        assert!(result.confidence < 0.5);
    }

    #[test]
    fn test_reply_validation() {
        let ok = ExpertiseReply {
            area: "Sales".to_string(),
            confidence: 0.7,
            reasoning: String::new(),
        };
        assert!(ok.validate().is_ok());
        assert_eq!(ok.into_result().unwrap().area, Area::Sales);

        let bad_area = ExpertiseReply {
            area: "astrology".to_string(),
            confidence: 0.7,
            reasoning: String::new(),
        };
        assert!(bad_area.validate().is_err());

        let bad_confidence = ExpertiseReply {
            area: "sales".to_string(),
            confidence: 7.0,
            reasoning: String::new(),
        };
        assert!(bad_confidence.validate().is_err());
    }
}
