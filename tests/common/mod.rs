// Shared fixtures for integration tests: stub model clients and an
// interview driver that answers whatever the engine asks

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use diagnostic_engine_lib::config::EngineConfig;
use diagnostic_engine_lib::interview::{InterviewEngine, NextQuestionResponse};
use diagnostic_engine_lib::models::{InterviewBlock, Question, SessionContext};
use diagnostic_engine_lib::orchestration::{
    ModelClient, ModelError, ModelReply, ModelRequest, Operation, TokenUsage,
};
use diagnostic_engine_lib::storage::{KeyValueStore, MemoryStore};

// ============================================================================
// Stub clients
// ============================================================================

/// Answers each operation with a fixed, valid reply
pub struct ScriptedClient {
    pub expertise: String,
    pub risk: String,
    pub diagnostic: String,
    pub calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(area: &str, risk_areas: &[&str]) -> Self {
        let risk: Vec<String> = risk_areas.iter().map(|a| format!("\"{}\"", a)).collect();
        Self {
            expertise: format!(
                r#"{{"area": "{}", "confidence": 0.9, "reasoning": "answers centre on {}"}}"#,
                area, area
            ),
            risk: format!(
                r#"{{"areas": [{}], "reasoning": "closest dependencies"}}"#,
                risk.join(", ")
            ),
            diagnostic: r#"```json
{
  "healthScores": [{"area": "finance", "score": 45, "summary": "thin cash runway"}],
  "detectedPatterns": [{"name": "Founder bottleneck", "description": "Decisions wait on one person", "areas": ["operations"], "evidence": ["exp_week"]}],
  "rootCauses": [],
  "recommendations": [
    {"title": "Extend runway", "description": "Cut burn by 15%", "priority": "high", "area": "finance"},
    {"title": "Delegate approvals", "description": "Move sign-off to team leads", "priority": "medium", "area": "operations"}
  ],
  "roadmap": [{"name": "Stabilise", "horizonDays": 30, "actions": ["Weekly cash review"]}]
}
```"#
                .to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = match request.operation {
            Operation::ExpertiseDetection => self.expertise.clone(),
            Operation::RiskSelection => self.risk.clone(),
            Operation::DiagnosticGeneration => self.diagnostic.clone(),
        };
        Ok(ModelReply {
            text,
            usage: TokenUsage {
                input_tokens: 1200,
                output_tokens: 300,
            },
        })
    }
}

/// Every call fails with a retryable transport error
#[derive(Default)]
pub struct FailingClient {
    pub calls: AtomicUsize,
}

impl FailingClient {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for FailingClient {
    fn name(&self) -> &str {
        "failing"
    }

    async fn complete(&self, _request: &ModelRequest) -> Result<ModelReply, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ModelError::Http {
            status: 503,
            message: "overloaded".to_string(),
        })
    }
}

/// Never answers within any sensible timeout
pub struct SlowClient;

#[async_trait]
impl ModelClient for SlowClient {
    fn name(&self) -> &str {
        "slow"
    }

    async fn complete(&self, _request: &ModelRequest) -> Result<ModelReply, ModelError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(ModelError::Timeout(30))
    }
}

// ============================================================================
// Engine setup
// ============================================================================

pub fn engine_with(client: Arc<dyn ModelClient>) -> InterviewEngine {
    engine_with_store(client, Arc::new(MemoryStore::new()), EngineConfig::default())
}

pub fn engine_with_store(
    client: Arc<dyn ModelClient>,
    store: Arc<dyn KeyValueStore>,
    config: EngineConfig,
) -> InterviewEngine {
    InterviewEngine::new(&config, store, client).unwrap()
}

// ============================================================================
// Driver
// ============================================================================

/// A complete, specific answer for any catalog question
pub fn answer_for(question: &Question, role: &str) -> String {
    match question.id.as_str() {
        "ctx_role" => return role.to_string(),
        "ctx_revenue" | "ctx_stage" => {
            if let Some(options) = &question.options {
                return options[1].clone();
            }
        }
        _ => {}
    }
    match question.options.as_ref() {
        Some(options) => options[0].clone(),
        None if question.is_quantitative() => "5".to_string(),
        None => "A detailed and specific answer covering this part of the business".to_string(),
    }
}

/// Everything observed while driving one interview
#[derive(Debug, Default)]
pub struct Transcript {
    /// Block of every question answered, in order
    pub blocks: Vec<InterviewBlock>,
    /// Completeness after every answer
    pub completeness: Vec<f64>,
    pub question_ids: Vec<String>,
    pub last: Option<NextQuestionResponse>,
}

pub async fn create(engine: &InterviewEngine) -> String {
    engine
        .create_session(SessionContext::default())
        .await
        .unwrap()
        .session_id
}

/// Answer questions until the engine says to finish
pub async fn drive(engine: &InterviewEngine, session_id: &str, role: &str) -> Transcript {
    let mut transcript = Transcript::default();

    for _ in 0..80 {
        let next = engine.next_question(session_id).await.unwrap();
        if next.should_finish {
            transcript.last = Some(next);
            return transcript;
        }
        let view = next.question.clone().expect("a question while not finished");
        let catalog_id = view.parent_question_id.clone().unwrap_or_else(|| view.id.clone());
        let question = engine.bank().get_question_by_id(&catalog_id).unwrap().clone();

        let response = engine
            .submit_answer(session_id, &view.id, &answer_for(&question, role))
            .await
            .unwrap();

        transcript.blocks.push(view.block);
        transcript.completeness.push(response.completeness_score);
        transcript.question_ids.push(view.id);
        transcript.last = Some(next);
    }
    panic!("interview did not finish within 80 answers");
}
