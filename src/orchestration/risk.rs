// Risk-area selection - graph suggestions, optionally refined by the model

use serde::Deserialize;
use std::collections::BTreeSet;
use tera::Context;

use super::parsing::{ParseError, Validate};
use super::prompts::{context_fields, transcript};
use crate::interview::QuestionBank;
use crate::models::{Area, InterviewBlock, InterviewSession, ResultSource, RiskSelection};

#[derive(Debug, Clone, Deserialize)]
pub struct RiskReply {
    pub areas: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl Validate for RiskReply {
    fn validate(&self) -> Result<(), ParseError> {
        if self.areas.is_empty() {
            return Err(ParseError::Schema("areas is empty".to_string()));
        }
        Ok(())
    }
}

impl RiskReply {
    /// Keep valid, distinct areas other than `detected`, in reply order.
    ///
    /// Returns `None` when fewer than `count` survive.
    pub fn select(&self, detected: Area, count: usize) -> Option<RiskSelection> {
        let mut seen = BTreeSet::new();
        let areas: Vec<Area> = self
            .areas
            .iter()
            .filter_map(|a| a.parse::<Area>().ok())
            .filter(|a| *a != detected && seen.insert(*a))
            .take(count)
            .collect();

        if areas.len() < count {
            return None;
        }
        Some(RiskSelection {
            areas,
            reasoning: self.reasoning.clone(),
            source: ResultSource::Model,
        })
    }
}

pub fn schema(count: usize) -> serde_json::Value {
    let areas: Vec<&str> = Area::all().iter().map(|a| a.as_str()).collect();
    serde_json::json!({
        "type": "object",
        "required": ["areas", "reasoning"],
        "properties": {
            "areas": {
                "type": "array",
                "items": { "type": "string", "enum": areas },
                "minItems": count,
                "maxItems": count
            },
            "reasoning": { "type": "string" }
        }
    })
}

pub fn prompt_context(
    bank: &QuestionBank,
    session: &InterviewSession,
    detected: Area,
    candidates: &[Area],
    count: usize,
) -> Context {
    let mut context = Context::new();
    context.insert("detected_area", detected.as_str());
    context.insert(
        "transcript",
        &transcript(bank, session, &[InterviewBlock::DeepDive]),
    );
    context.insert("context", &context_fields(session));
    context.insert(
        "candidates",
        &candidates.iter().map(|a| a.as_str()).collect::<Vec<_>>(),
    );
    context.insert(
        "areas",
        &Area::all()
            .iter()
            .filter(|a| **a != detected)
            .map(|a| a.as_str())
            .collect::<Vec<_>>(),
    );
    context.insert("count", &count);
    context.insert("schema", &schema(count).to_string());
    context
}

/// Deterministic fallback: the first `count` graph suggestions
pub fn heuristic(detected: Area, candidates: &[Area], count: usize) -> RiskSelection {
    let areas: Vec<Area> = candidates.iter().copied().take(count).collect();
    RiskSelection {
        reasoning: format!(
            "Areas most strongly linked to {} in the dependency graph: {}",
            detected,
            areas
                .iter()
                .map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ),
        areas,
        source: ResultSource::Graph,
    }
}
