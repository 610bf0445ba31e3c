//! Weak-signal detection
//!
//! Each `SignalDetector` inspects a single answer and may report a scored
//! signal. `CompositeDetector` combines them: an answer triggers a follow-up
//! when any one signal reaches the threshold, or when the signals together
//! reach one and a half times the threshold.

use chrono::Utc;

use super::extraction::{extract_number, has_number, is_non_answer};
use crate::models::{FieldValue, FollowUpQuestion, Question, SignalKind};

/// Everything a detector may look at
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    pub question: &'a Question,
    pub answer: &'a str,
    /// Value previously extracted for the question's field, if any
    pub previous_value: Option<&'a FieldValue>,
    pub min_answer_chars: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub kind: SignalKind,
    /// 0.0 - 1.0
    pub score: f64,
    pub reason: String,
}

pub trait SignalDetector: Send + Sync {
    fn name(&self) -> &'static str;
    fn detect(&self, ctx: &SignalContext<'_>) -> Option<Signal>;
}

fn count_phrases(text: &str, phrases: &[&str]) -> usize {
    let padded = format!(" {} ", text.to_lowercase());
    phrases
        .iter()
        .filter(|p| padded.contains(&format!(" {}", p)))
        .count()
}

// ============================================================================
// Strategies
// ============================================================================

const HEDGES: &[&str] = &[
    "i guess",
    "kind of",
    "sort of",
    "maybe",
    "probably",
    "not sure",
    "i think",
    "hard to say",
    "it depends",
    "no idea",
    "don't know",
    "dunno",
    "somewhat",
    "more or less",
];

/// Hedging and uncertainty markers
pub struct HedgingDetector;

impl SignalDetector for HedgingDetector {
    fn name(&self) -> &'static str {
        "hedging"
    }

    fn detect(&self, ctx: &SignalContext<'_>) -> Option<Signal> {
        let hits = count_phrases(ctx.answer, HEDGES);
        (hits > 0).then(|| Signal {
            kind: SignalKind::Hedging,
            score: (0.35 * hits as f64).min(1.0),
            reason: format!("{} hedging phrase(s)", hits),
        })
    }
}

/// Outright non-answers ("no idea", "not sure")
pub struct NonAnswerDetector;

impl SignalDetector for NonAnswerDetector {
    fn name(&self) -> &'static str {
        "non-answer"
    }

    fn detect(&self, ctx: &SignalContext<'_>) -> Option<Signal> {
        is_non_answer(ctx.answer).then(|| Signal {
            kind: SignalKind::Vague,
            score: 0.9,
            reason: "the question was not answered".to_string(),
        })
    }
}

/// Free-text answers below the minimum length
pub struct LengthDetector;

impl SignalDetector for LengthDetector {
    fn name(&self) -> &'static str {
        "length"
    }

    fn detect(&self, ctx: &SignalContext<'_>) -> Option<Signal> {
        if !ctx.question.is_free_text() || ctx.min_answer_chars == 0 {
            return None;
        }
        let len = ctx.answer.trim().chars().count();
        (len < ctx.min_answer_chars).then(|| Signal {
            kind: SignalKind::Vague,
            score: 1.0 - len as f64 / ctx.min_answer_chars as f64,
            reason: format!("{} characters, expected at least {}", len, ctx.min_answer_chars),
        })
    }
}

/// Quantitative questions answered without any number
pub struct UnquantifiedDetector;

impl SignalDetector for UnquantifiedDetector {
    fn name(&self) -> &'static str {
        "unquantified"
    }

    fn detect(&self, ctx: &SignalContext<'_>) -> Option<Signal> {
        (ctx.question.is_quantitative() && !has_number(ctx.answer)).then(|| Signal {
            kind: SignalKind::Unquantified,
            score: 0.8,
            reason: "no figure given for a quantitative question".to_string(),
        })
    }
}

const OPPOSITES: &[(&str, &str)] = &[
    ("always", "never"),
    ("increasing", "decreasing"),
    ("growing", "shrinking"),
    ("better", "worse"),
    ("more", "less"),
    ("profitable", "losing money"),
];

/// Opposing statements in one answer, or a figure far from the one given before
pub struct ContradictionDetector;

impl SignalDetector for ContradictionDetector {
    fn name(&self) -> &'static str {
        "contradiction"
    }

    fn detect(&self, ctx: &SignalContext<'_>) -> Option<Signal> {
        if let (Some(FieldValue::Number(previous)), Some(current)) = (
            ctx.previous_value,
            extract_number(ctx.answer, None).filter(|_| ctx.question.is_quantitative()),
        ) {
            let drift = (current - previous).abs() / previous.abs().max(1.0);
            if drift > 0.5 {
                return Some(Signal {
                    kind: SignalKind::Contradictory,
                    score: 0.7,
                    reason: format!("{} differs from the earlier {}", current, previous),
                });
            }
        }

        let lower = format!(" {} ", ctx.answer.to_lowercase());
        let pair = OPPOSITES.iter().find(|(a, b)| {
            lower.contains(&format!(" {} ", a)) && lower.contains(&format!(" {} ", b))
        })?;
        Some(Signal {
            kind: SignalKind::Contradictory,
            score: 0.6,
            reason: format!("both '{}' and '{}'", pair.0, pair.1),
        })
    }
}

const URGENT: &[&str] = &[
    "urgent",
    "crisis",
    "desperate",
    "asap",
    "emergency",
    "bleeding",
    "running out",
    "burning out",
    "burnt out",
    "about to lose",
    "can't make payroll",
    "collapse",
    "falling apart",
];

/// Emotionally urgent language
pub struct UrgencyDetector;

impl SignalDetector for UrgencyDetector {
    fn name(&self) -> &'static str {
        "urgency"
    }

    fn detect(&self, ctx: &SignalContext<'_>) -> Option<Signal> {
        let hits = count_phrases(ctx.answer, URGENT);
        (hits > 0).then(|| Signal {
            kind: SignalKind::Urgent,
            score: (0.4 * hits as f64).min(1.0),
            reason: format!("{} urgency marker(s)", hits),
        })
    }
}

// ============================================================================
// Composite
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SignalReport {
    pub signals: Vec<Signal>,
    pub total: f64,
    pub triggered: bool,
}

impl SignalReport {
    /// Highest-scoring signal; ties keep detector order
    pub fn strongest(&self) -> Option<&Signal> {
        self.signals.iter().fold(None, |best: Option<&Signal>, s| match best {
            Some(b) if b.score >= s.score => Some(b),
            _ => Some(s),
        })
    }
}

pub struct CompositeDetector {
    detectors: Vec<Box<dyn SignalDetector>>,
    threshold: f64,
}

impl CompositeDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            detectors: Vec::new(),
            threshold,
        }
    }

    /// All built-in strategies
    pub fn with_defaults(threshold: f64) -> Self {
        Self::new(threshold)
            .with_detector(Box::new(LengthDetector))
            .with_detector(Box::new(UnquantifiedDetector))
            .with_detector(Box::new(HedgingDetector))
            .with_detector(Box::new(NonAnswerDetector))
            .with_detector(Box::new(ContradictionDetector))
            .with_detector(Box::new(UrgencyDetector))
    }

    pub fn with_detector(mut self, detector: Box<dyn SignalDetector>) -> Self {
        self.detectors.push(detector);
        self
    }

    pub fn detector_names(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.name()).collect()
    }

    pub fn evaluate(&self, ctx: &SignalContext<'_>) -> SignalReport {
        let signals: Vec<Signal> = self
            .detectors
            .iter()
            .filter_map(|d| d.detect(ctx))
            .collect();
        let total: f64 = signals.iter().map(|s| s.score).sum();
        let triggered = signals.iter().any(|s| s.score >= self.threshold)
            || total >= 1.5 * self.threshold;

        SignalReport {
            signals,
            total,
            triggered,
        }
    }
}

// ============================================================================
// Follow-up Templates
// ============================================================================

/// Build the clarification question for the strongest signal
pub fn build_follow_up(parent: &Question, signal: &Signal, ordinal: u32) -> FollowUpQuestion {
    let topic = &parent.topic;
    let text = match signal.kind {
        SignalKind::Vague => format!(
            "Could you say a bit more? In particular: {}",
            parent.text
        ),
        SignalKind::Hedging => format!(
            "It sounds like you're not fully sure about {}. What is your best estimate, even a rough one?",
            topic
        ),
        SignalKind::Unquantified => format!(
            "Could you put a number on {}? A rough figure is fine.",
            topic
        ),
        SignalKind::Contradictory => format!(
            "That seems to differ from what you said about {}. Which is closer to reality today?",
            topic
        ),
        SignalKind::Urgent => format!(
            "That sounds pressing. What happens if {} is not addressed in the next 90 days?",
            topic
        ),
    };

    FollowUpQuestion {
        id: format!("{}:follow-up:{}", parent.id, ordinal),
        parent_question_id: parent.id.clone(),
        text,
        signal: signal.kind,
        created_at: Utc::now(),
    }
}
