// Prompt templates for the model-backed operations, rendered with Tera

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::EngineError;
use crate::interview::QuestionBank;
use crate::models::{InterviewBlock, InterviewSession};

/// Bumped whenever template wording changes; recorded in the cost ledger
pub const PROMPT_VERSION: &str = "2026-10.1";

pub const SYSTEM: &str = "system";
pub const EXPERTISE_DETECTION: &str = "expertise_detection";
pub const RISK_SELECTION: &str = "risk_selection";
pub const DIAGNOSTIC_GENERATION: &str = "diagnostic_generation";
pub const CORRECTIVE: &str = "corrective";

const SYSTEM_TEMPLATE: &str = r#"You are a senior business analyst reviewing an interview with a company leader.
Base every statement on the respondent's own answers. Do not invent facts.
Reply with a single JSON object and nothing else."#;

const EXPERTISE_TEMPLATE: &str = r#"The respondent ({{ role | default(value="role unknown") }}) answered these questions about their own work:

{% for entry in transcript -%}
Q: {{ entry.question }}
A: {{ entry.answer }}

{% endfor -%}
Which ONE of these business areas is their primary competence: {{ areas | join(sep=", ") }}?

Reply with JSON matching this schema:
{{ schema }}"#;

const RISK_TEMPLATE: &str = r#"The respondent's primary area is {{ detected_area }}. Their deep-dive answers:

{% for entry in transcript -%}
Q: {{ entry.question }}
A: {{ entry.answer }}

{% endfor -%}
Company context:
{% for field in context -%}
- {{ field.name }}: {{ field.value }}
{% endfor %}
Pick exactly {{ count }} areas, other than {{ detected_area }}, where this company most likely has hidden weaknesses the respondent is not seeing.
Candidates suggested by the area dependency graph, strongest first: {{ candidates | join(sep=", ") }}.
You may choose other areas from: {{ areas | join(sep=", ") }}.

Reply with JSON matching this schema:
{{ schema }}"#;

const DIAGNOSTIC_TEMPLATE: &str = r#"Produce a business diagnostic from this interview.

Primary area of the respondent: {{ detected_area | default(value="unknown") }}
Risk areas scanned: {{ risk_areas | join(sep=", ") }}

Extracted data:
{% for field in context -%}
- {{ field.name }}: {{ field.value }}
{% endfor %}
Full transcript:
{% for entry in transcript -%}
[{{ entry.block }}] Q: {{ entry.question }}
A: {{ entry.answer }}

{% endfor -%}
Score each area you have evidence for from 0 (failing) to 100 (excellent).
Every pattern and root cause must quote evidence from the answers.
Recommendation priorities are one of: critical, high, medium, low.
Roadmap phases cover 30, 60 and 90 days.

Reply with JSON matching this schema:
{{ schema }}"#;

const CORRECTIVE_TEMPLATE: &str = r#"{{ original }}

Your previous reply could not be used ({{ error }}).
Reply again with ONLY a JSON object matching the schema above. No prose, no markdown."#;

/// One question/answer pair as shown to the model
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    pub block: String,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextField {
    pub name: String,
    pub value: String,
}

/// Build the transcript for the given blocks (all blocks when empty)
pub fn transcript(
    bank: &QuestionBank,
    session: &InterviewSession,
    blocks: &[InterviewBlock],
) -> Vec<TranscriptEntry> {
    session
        .answers
        .iter()
        .filter(|a| blocks.is_empty() || blocks.contains(&a.block))
        .map(|a| {
            let text = bank
                .get_question_by_id(&a.question_id)
                .map(|q| q.text.clone())
                .unwrap_or_else(|_| a.question_id.clone());
            let question = if a.is_follow_up() {
                format!("(clarifying) {}", text)
            } else {
                text
            };
            TranscriptEntry {
                block: a.block.to_string(),
                question,
                answer: a.text.clone(),
            }
        })
        .collect()
}

/// Extracted data rendered as name/value pairs
pub fn context_fields(session: &InterviewSession) -> Vec<ContextField> {
    session
        .extracted_data
        .iter()
        .map(|(name, value)| ContextField {
            name: name.clone(),
            value: value.display(),
        })
        .collect()
}

pub struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    pub fn new() -> Result<Self, EngineError> {
        let mut tera = Tera::default();
        for (name, template) in [
            (SYSTEM, SYSTEM_TEMPLATE),
            (EXPERTISE_DETECTION, EXPERTISE_TEMPLATE),
            (RISK_SELECTION, RISK_TEMPLATE),
            (DIAGNOSTIC_GENERATION, DIAGNOSTIC_TEMPLATE),
            (CORRECTIVE, CORRECTIVE_TEMPLATE),
        ] {
            tera.add_raw_template(name, template).map_err(|e| {
                EngineError::Config(format!("Failed to add template '{}': {}", name, e))
            })?;
        }
        Ok(Self { tera })
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<String, EngineError> {
        self.tera
            .render(name, context)
            .map_err(|e| EngineError::Config(format!("Failed to render template '{}': {}", name, e)))
    }

    pub fn system(&self) -> Result<String, EngineError> {
        self.render(SYSTEM, &Context::new())
    }

    /// Re-ask after an unusable reply
    pub fn corrective(&self, original: &str, error: &str) -> Result<String, EngineError> {
        let mut context = Context::new();
        context.insert("original", original);
        context.insert("error", error);
        self.render(CORRECTIVE, &context)
    }
}
