// Diagnostic models - the immutable report produced once per completed interview

use super::{Area, CompletionMetrics, ResultSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Tiers and Priorities
// ============================================================================

/// How trustworthy a diagnostic is, given completeness and answer specificity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    /// Step down by `steps` tiers, saturating at `Low`
    pub fn downgrade(self, steps: usize) -> ConfidenceTier {
        let mut tier = self;
        for _ in 0..steps {
            tier = match tier {
                ConfidenceTier::High => ConfidenceTier::Medium,
                _ => ConfidenceTier::Low,
            };
        }
        tier
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank, most urgent first
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" | "urgent" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" | "moderate" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(format!(
                "Invalid priority: '{}'. Expected 'critical', 'high', 'medium', or 'low'",
                s
            )),
        }
    }
}

/// Estimated commercial value of a lead, used to gate model spend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadValue {
    Low,
    Standard,
    High,
}

// ============================================================================
// Findings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Derived only from extracted answers
    Measured,
    /// Measured score blended with the model's assessment
    Blended,
    /// Only the model's assessment was available
    Model,
    /// No data; neutral default
    Default,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaScore {
    pub area: Area,
    /// 0-100
    pub score: u8,
    pub source: ScoreSource,
    pub data_points: usize,
    /// Criticality weight used for the overall score
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pattern {
    pub name: String,
    pub description: String,
    pub areas: Vec<Area>,
    /// Quotes or extracted values from the respondent's answers
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootCause {
    pub title: String,
    pub description: String,
    pub affected_areas: Vec<Area>,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Area>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_impact: Option<String>,
}

/// A time-boxed set of recommended actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapPhase {
    pub name: String,
    pub horizon_days: u32,
    pub actions: Vec<String>,
}

/// Per-area assessment proposed by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAreaScore {
    pub area: Area,
    pub score: u8,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Qualitative findings produced by diagnostic generation (model or heuristic)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticDraft {
    pub health_scores: Vec<ModelAreaScore>,
    pub detected_patterns: Vec<Pattern>,
    pub root_causes: Vec<RootCause>,
    pub recommendations: Vec<Recommendation>,
    pub roadmap: Vec<RoadmapPhase>,
    pub source: Option<ResultSource>,
}

// ============================================================================
// Diagnostic
// ============================================================================

/// Final report. Immutable after creation and persisted independently of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub id: String,
    pub session_id: String,
    pub generated_at: DateTime<Utc>,
    /// 0-100, criticality-weighted
    pub overall_score: u8,
    pub confidence: ConfidenceTier,
    pub detected_area: Option<Area>,
    pub risk_areas: Vec<Area>,
    pub health_scores: Vec<AreaScore>,
    pub detected_patterns: Vec<Pattern>,
    pub root_causes: Vec<RootCause>,
    pub recommendations: Vec<Recommendation>,
    pub roadmap: Vec<RoadmapPhase>,
    pub lead_value: LeadValue,
    pub completion_metrics: CompletionMetrics,
    /// Recoverable failures that lowered the quality of this report
    pub degradations: Vec<String>,
}
