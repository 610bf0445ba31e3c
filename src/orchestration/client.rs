//! Model client seam
//!
//! The orchestration layer only needs "complete(prompt, schema) -> text".
//! `HttpModelClient` speaks the Anthropic messages API; tests inject their
//! own implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ModelConfig;

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The three model-backed operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ExpertiseDetection,
    RiskSelection,
    DiagnosticGeneration,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ExpertiseDetection => "expertise_detection",
            Operation::RiskSelection => "risk_selection",
            Operation::DiagnosticGeneration => "diagnostic_generation",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub operation: Operation,
    pub system: String,
    pub prompt: String,
    /// JSON schema the reply must satisfy; included in the prompt by the caller
    pub schema: serde_json::Value,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Error)]
pub enum ModelError {
    #[error("Model is unavailable: {0}")]
    Unavailable(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),

    #[error("Budget exhausted: spent ${spent:.4} of ${limit:.4}")]
    Budget { spent: f64, limit: f64 },

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Anything that can complete a prompt
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Identifier used in logs and the cost ledger
    fn name(&self) -> &str;

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError>;
}

// ============================================================================
// Disabled client
// ============================================================================

/// Used when no model is configured; every call fails so callers fall back
pub struct DisabledModelClient;

#[async_trait]
impl ModelClient for DisabledModelClient {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        Err(ModelError::Unavailable(format!(
            "no model configured for {}",
            request.operation
        )))
    }
}

// ============================================================================
// HTTP client
// ============================================================================

pub struct HttpModelClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpModelClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// Build from configuration, reading the API key from the configured variable
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ModelError::Authentication(format!("{} is not set", config.api_key_env))
        })?;
        if api_key.trim().is_empty() {
            return Err(ModelError::Authentication(format!(
                "{} is empty",
                config.api_key_env
            )));
        }
        Ok(Self::new(&config.endpoint, &config.model, api_key))
    }

    fn build_request_body(&self, request: &ModelRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": [
                { "role": "user", "content": request.prompt }
            ],
        })
    }
}

/// Map a non-success status to a typed error
fn parse_http_error(status: u16, body: &str) -> ModelError {
    match status {
        401 | 403 => ModelError::Authentication(body.to_string()),
        _ => ModelError::Http {
            status,
            message: body.chars().take(500).collect(),
        },
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelReply, ModelError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&self.build_request_body(request))
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body_text = response
            .text()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if status != 200 {
            return Err(parse_http_error(status, &body_text));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body_text)
            .map_err(|e| ModelError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ModelReply {
            text,
            usage: TokenUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }
}

/// Messages API response format
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: ResponseUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u32,
    output_tokens: u32,
}
