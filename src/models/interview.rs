// Interview models - blocks, catalog questions, answers and extracted values

use super::Area;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// Interview Blocks
// ============================================================================

/// The four ordered phases of an interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterviewBlock {
    /// Fixed questions about the company, always asked
    Context,
    /// Open-ended questions used to classify the respondent's primary area
    Expertise,
    /// Questions specific to the detected area
    DeepDive,
    /// One question per selected risk area
    RiskScan,
}

impl InterviewBlock {
    /// Get all blocks in traversal order
    pub fn all() -> &'static [InterviewBlock] {
        &[
            InterviewBlock::Context,
            InterviewBlock::Expertise,
            InterviewBlock::DeepDive,
            InterviewBlock::RiskScan,
        ]
    }

    /// Get the next block, if any
    pub fn next(&self) -> Option<InterviewBlock> {
        match self {
            InterviewBlock::Context => Some(InterviewBlock::Expertise),
            InterviewBlock::Expertise => Some(InterviewBlock::DeepDive),
            InterviewBlock::DeepDive => Some(InterviewBlock::RiskScan),
            InterviewBlock::RiskScan => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewBlock::Context => "context",
            InterviewBlock::Expertise => "expertise",
            InterviewBlock::DeepDive => "deep-dive",
            InterviewBlock::RiskScan => "risk-scan",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            InterviewBlock::Context => "Company Context",
            InterviewBlock::Expertise => "Your Expertise",
            InterviewBlock::DeepDive => "Deep Dive",
            InterviewBlock::RiskScan => "Risk Scan",
        }
    }

    /// Get the block index (0-based)
    pub fn index(&self) -> usize {
        match self {
            InterviewBlock::Context => 0,
            InterviewBlock::Expertise => 1,
            InterviewBlock::DeepDive => 2,
            InterviewBlock::RiskScan => 3,
        }
    }
}

impl Default for InterviewBlock {
    fn default() -> Self {
        InterviewBlock::Context
    }
}

impl std::fmt::Display for InterviewBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InterviewBlock {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "context" => Ok(InterviewBlock::Context),
            "expertise" => Ok(InterviewBlock::Expertise),
            "deep-dive" | "deepdive" => Ok(InterviewBlock::DeepDive),
            "risk-scan" | "riskscan" => Ok(InterviewBlock::RiskScan),
            _ => Err(format!(
                "Invalid block: '{}'. Expected 'context', 'expertise', 'deep-dive', or 'risk-scan'",
                s
            )),
        }
    }
}

// ============================================================================
// Questions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    Text,
    SingleChoice,
    MultiChoice,
    Number,
}

/// Respondent persona, derived from the role they state in the context block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Founder,
    Technical,
    Commercial,
    Operator,
}

impl Persona {
    /// Map a stated role (free text or a context-block option) to a persona
    pub fn from_role(role: &str) -> Option<Persona> {
        let role = role.to_lowercase();
        if role.contains("founder") || role.contains("ceo") || role.contains("owner") {
            Some(Persona::Founder)
        } else if role.contains("cto") || role.contains("technical") || role.contains("engineer") {
            Some(Persona::Technical)
        } else if role.contains("sales") || role.contains("marketing") {
            Some(Persona::Commercial)
        } else if role.contains("operations")
            || role.contains("finance")
            || role.contains("hr")
            || role.contains("people")
        {
            Some(Persona::Operator)
        } else {
            None
        }
    }
}

/// How a raw answer is parsed into a structured field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionRule {
    /// Free text, trimmed; shorter answers count as not extracted
    Text { min_chars: usize },
    /// First number in the answer, optionally bounded
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// A number between 0 and 100
    Percentage,
    /// One of a fixed set of options
    Choice { options: Vec<String> },
    /// Any subset of a fixed set of options
    MultiChoice { options: Vec<String> },
    /// A free-form list of items
    List,
}

/// Binds a question to the field it populates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extractor {
    pub field: String,
    pub rule: ExtractionRule,
}

/// Maps an extracted value onto a 0-100 health contribution for the question's area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealthRule {
    /// Lower is better: at or below `good` scores 100, at or above `bad` scores 0
    LowerIsBetter { good: f64, bad: f64 },
    /// Higher is better: at or above `good` scores 100, at or below `bad` scores 0
    HigherIsBetter { good: f64, bad: f64 },
    /// Score per option, matched case-insensitively
    ChoiceScores { scores: Vec<(String, u8)> },
}

/// An immutable catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub block: InterviewBlock,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Area>,
    pub text: String,
    pub input_type: InputType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub extractor: Extractor,
    /// Topic label recorded in `topicsCovered` once answered
    pub topic: String,
    /// Whether the extracted field counts towards completeness
    pub essential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applies_to_personas: Option<BTreeSet<Persona>>,
}

impl Question {
    /// Build an essential question; the input type and options follow from the rule
    pub fn new(
        id: &str,
        block: InterviewBlock,
        area: Option<Area>,
        text: &str,
        field: &str,
        topic: &str,
        rule: ExtractionRule,
    ) -> Self {
        let (input_type, options) = match &rule {
            ExtractionRule::Text { .. } | ExtractionRule::List => (InputType::Text, None),
            ExtractionRule::Number { .. } | ExtractionRule::Percentage => (InputType::Number, None),
            ExtractionRule::Choice { options } => (InputType::SingleChoice, Some(options.clone())),
            ExtractionRule::MultiChoice { options } => {
                (InputType::MultiChoice, Some(options.clone()))
            }
        };

        Self {
            id: id.to_string(),
            block,
            area,
            text: text.to_string(),
            input_type,
            options,
            extractor: Extractor {
                field: field.to_string(),
                rule,
            },
            topic: topic.to_string(),
            essential: true,
            health: None,
            applies_to_personas: None,
        }
    }

    pub fn with_health(mut self, health: HealthRule) -> Self {
        self.health = Some(health);
        self
    }

    /// Mark the field as nice-to-have; it no longer counts towards completeness
    pub fn optional(mut self) -> Self {
        self.essential = false;
        self
    }

    pub fn for_personas(mut self, personas: &[Persona]) -> Self {
        self.applies_to_personas = Some(personas.iter().copied().collect());
        self
    }

    pub fn field(&self) -> &str {
        &self.extractor.field
    }

    /// Whether this question should be asked of the given persona
    pub fn applies_to(&self, persona: Option<Persona>) -> bool {
        match (&self.applies_to_personas, persona) {
            (Some(personas), Some(persona)) => personas.contains(&persona),
            _ => true,
        }
    }

    /// Whether answers to this question are free text (subject to length checks)
    pub fn is_free_text(&self) -> bool {
        matches!(
            self.extractor.rule,
            ExtractionRule::Text { .. } | ExtractionRule::List
        )
    }

    /// Whether this question expects a quantified answer
    pub fn is_quantitative(&self) -> bool {
        matches!(
            self.extractor.rule,
            ExtractionRule::Number { .. } | ExtractionRule::Percentage
        )
    }
}

/// Kinds of weak signal that can trigger a follow-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Vague,
    Hedging,
    Unquantified,
    Contradictory,
    Urgent,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Vague => "vague",
            SignalKind::Hedging => "hedging",
            SignalKind::Unquantified => "unquantified",
            SignalKind::Contradictory => "contradictory",
            SignalKind::Urgent => "urgent",
        }
    }
}

/// A dynamically generated clarification question, not part of the static catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpQuestion {
    pub id: String,
    /// The catalog question whose answer triggered this follow-up
    pub parent_question_id: String,
    pub text: String,
    pub signal: SignalKind,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Answers and Extracted Values
// ============================================================================

/// A submitted answer. Appended to the session log, never mutated or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    /// Catalog question id (for follow-ups, the parent question's id)
    pub question_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub block: InterviewBlock,
    /// Set when this answer responded to a follow-up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_id: Option<String>,
}

impl Answer {
    pub fn is_follow_up(&self) -> bool {
        self.follow_up_id.is_some()
    }
}

/// A structured value extracted from an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short human-readable rendering, used in prompts and evidence
    pub fn display(&self) -> String {
        match self {
            FieldValue::Number(n) if n.fract() == 0.0 => format!("{}", *n as i64),
            FieldValue::Number(n) => format!("{:.2}", n),
            FieldValue::Text(s) => s.clone(),
            FieldValue::List(items) => items.join(", "),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_order() {
        assert_eq!(InterviewBlock::Context.next(), Some(InterviewBlock::Expertise));
        assert_eq!(InterviewBlock::Expertise.next(), Some(InterviewBlock::DeepDive));
        assert_eq!(InterviewBlock::DeepDive.next(), Some(InterviewBlock::RiskScan));
        assert_eq!(InterviewBlock::RiskScan.next(), None);
        for (i, block) in InterviewBlock::all().iter().enumerate() {
            assert_eq!(block.index(), i);
        }
    }

    #[test]
    fn test_block_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&InterviewBlock::DeepDive).unwrap(),
            "\"deep-dive\""
        );
        assert_eq!(
            "risk_scan".parse::<InterviewBlock>().unwrap(),
            InterviewBlock::RiskScan
        );
    }

    #[test]
    fn test_persona_from_role() {
        assert_eq!(Persona::from_role("Founder/CEO"), Some(Persona::Founder));
        assert_eq!(
            Persona::from_role("CTO/Technical lead"),
            Some(Persona::Technical)
        );
        assert_eq!(Persona::from_role("Sales lead"), Some(Persona::Commercial));
        assert_eq!(Persona::from_role("Gardener"), None);
    }

    #[test]
    fn test_field_value_untagged_serialization() {
        let values = vec![
            FieldValue::Number(12.0),
            FieldValue::Text("SaaS".to_string()),
            FieldValue::List(vec!["mrr".to_string(), "churn".to_string()]),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[12.0,"SaaS",["mrr","churn"]]"#);
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Number(40.0).display(), "40");
        assert_eq!(FieldValue::Number(2.5).display(), "2.50");
        assert_eq!(
            FieldValue::List(vec!["a".to_string(), "b".to_string()]).display(),
            "a, b"
        );
    }
}
