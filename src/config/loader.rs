// Configuration file loading

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::InterviewBlock;

/// File name looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = "diagnostic-engine.toml";

/// Engine configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    /// Interview routing thresholds
    #[serde(default)]
    pub interview: InterviewConfig,
    /// Completeness and confidence scoring
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Language model settings
    #[serde(default)]
    pub model: ModelConfig,
    /// Session storage
    #[serde(default)]
    pub storage: StorageConfig,
    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,
}

/// A value configured separately for each interview block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockSettings<T> {
    pub context: T,
    pub expertise: T,
    #[serde(rename = "deepDive", alias = "deep_dive")]
    pub deep_dive: T,
    #[serde(rename = "riskScan", alias = "risk_scan")]
    pub risk_scan: T,
}

impl<T: Copy> BlockSettings<T> {
    pub fn get(&self, block: InterviewBlock) -> T {
        match block {
            InterviewBlock::Context => self.context,
            InterviewBlock::Expertise => self.expertise,
            InterviewBlock::DeepDive => self.deep_dive,
            InterviewBlock::RiskScan => self.risk_scan,
        }
    }
}

/// Interview routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    /// Minimum catalog answers before a block may end
    #[serde(rename = "minQuestions", alias = "min_questions", default = "default_min_questions")]
    pub min_questions: BlockSettings<usize>,
    /// Minimum block completeness (0-100) before a block may end
    #[serde(rename = "blockCompleteness", alias = "block_completeness", default = "default_block_completeness")]
    pub block_completeness: BlockSettings<f64>,
    /// Minimum global completeness (0-100) before the interview may finish
    #[serde(rename = "terminalCompleteness", alias = "terminal_completeness", default = "default_terminal_completeness")]
    pub terminal_completeness: f64,
    /// Maximum dynamically generated follow-ups per session
    #[serde(rename = "followUpBudget", alias = "follow_up_budget", default = "default_follow_up_budget")]
    pub follow_up_budget: u32,
    /// Weak-signal score (0-1) at which a follow-up is issued
    #[serde(rename = "signalThreshold", alias = "signal_threshold", default = "default_signal_threshold")]
    pub signal_threshold: f64,
    /// Free-text answers shorter than this count as vague
    #[serde(rename = "minAnswerChars", alias = "min_answer_chars", default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
    /// Number of areas covered by the risk-scan block
    #[serde(rename = "riskAreaCount", alias = "risk_area_count", default = "default_risk_area_count")]
    pub risk_area_count: usize,
    /// Suggested risk areas further than this many graph hops are deprioritized
    #[serde(rename = "maxRiskDistance", alias = "max_risk_distance", default = "default_max_risk_distance")]
    pub max_risk_distance: usize,
}

fn default_min_questions() -> BlockSettings<usize> {
    BlockSettings { context: 7, expertise: 4, deep_dive: 5, risk_scan: 3 }
}
fn default_block_completeness() -> BlockSettings<f64> {
    BlockSettings { context: 70.0, expertise: 50.0, deep_dive: 60.0, risk_scan: 50.0 }
}
fn default_terminal_completeness() -> f64 { 60.0 }
fn default_follow_up_budget() -> u32 { 3 }
fn default_signal_threshold() -> f64 { 0.5 }
fn default_min_answer_chars() -> usize { 20 }
fn default_risk_area_count() -> usize { 3 }
fn default_max_risk_distance() -> usize { 2 }

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            min_questions: default_min_questions(),
            block_completeness: default_block_completeness(),
            terminal_completeness: default_terminal_completeness(),
            follow_up_budget: default_follow_up_budget(),
            signal_threshold: default_signal_threshold(),
            min_answer_chars: default_min_answer_chars(),
            risk_area_count: default_risk_area_count(),
            max_risk_distance: default_max_risk_distance(),
        }
    }
}

/// Completeness and confidence scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight of each essential field, per block
    #[serde(rename = "blockWeights", alias = "block_weights", default = "default_block_weights")]
    pub block_weights: BlockSettings<f64>,
    /// Completeness at or above which confidence starts as high
    #[serde(rename = "highConfidenceAt", alias = "high_confidence_at", default = "default_high_confidence")]
    pub high_confidence_at: f64,
    /// Completeness at or above which confidence starts as medium
    #[serde(rename = "mediumConfidenceAt", alias = "medium_confidence_at", default = "default_medium_confidence")]
    pub medium_confidence_at: f64,
    /// Share of vague free-text answers that costs one confidence tier
    #[serde(rename = "vagueRatioOneTier", alias = "vague_ratio_one_tier", default = "default_vague_one")]
    pub vague_ratio_one_tier: f64,
    /// Share of vague free-text answers that costs two confidence tiers
    #[serde(rename = "vagueRatioTwoTiers", alias = "vague_ratio_two_tiers", default = "default_vague_two")]
    pub vague_ratio_two_tiers: f64,
}

fn default_block_weights() -> BlockSettings<f64> {
    BlockSettings { context: 3.0, expertise: 2.0, deep_dive: 2.0, risk_scan: 1.0 }
}
fn default_high_confidence() -> f64 { 80.0 }
fn default_medium_confidence() -> f64 { 50.0 }
fn default_vague_one() -> f64 { 0.2 }
fn default_vague_two() -> f64 { 0.5 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            block_weights: default_block_weights(),
            high_confidence_at: default_high_confidence(),
            medium_confidence_at: default_medium_confidence(),
            vague_ratio_one_tier: default_vague_one(),
            vague_ratio_two_tiers: default_vague_two(),
        }
    }
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// When false every model operation goes straight to its heuristic fallback
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Messages endpoint of the provider
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key
    #[serde(rename = "apiKeyEnv", alias = "api_key_env", default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-call timeout
    #[serde(rename = "timeoutSecs", alias = "timeout_secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(rename = "maxTokens", alias = "max_tokens", default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Spend ceiling per session in USD
    #[serde(rename = "maxCostPerSessionUsd", alias = "max_cost_per_session_usd", default = "default_max_cost")]
    pub max_cost_per_session_usd: f64,
    #[serde(rename = "inputCostPerMtok", alias = "input_cost_per_mtok", default = "default_input_cost")]
    pub input_cost_per_mtok: f64,
    #[serde(rename = "outputCostPerMtok", alias = "output_cost_per_mtok", default = "default_output_cost")]
    pub output_cost_per_mtok: f64,
    /// Skip model diagnostic generation for low-value leads unless overridden
    #[serde(rename = "skipLowValueLeads", alias = "skip_low_value_leads", default = "default_true")]
    pub skip_low_value_leads: bool,
}

fn default_true() -> bool { true }
fn default_endpoint() -> String { "https://api.anthropic.com/v1/messages".to_string() }
fn default_model() -> String { "claude-sonnet-4-5".to_string() }
fn default_api_key_env() -> String { "ANTHROPIC_API_KEY".to_string() }
fn default_timeout_secs() -> u64 { 60 }
fn default_max_tokens() -> u32 { 4096 }
fn default_max_cost() -> f64 { 0.50 }
fn default_input_cost() -> f64 { 3.0 }
fn default_output_cost() -> f64 { 15.0 }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            max_cost_per_session_usd: default_max_cost(),
            input_cost_per_mtok: default_input_cost(),
            output_cost_per_mtok: default_output_cost(),
            skip_low_value_leads: default_true(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    File,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" => Ok(StorageBackend::Memory),
            "file" | "files" | "disk" => Ok(StorageBackend::File),
            _ => Err(format!(
                "Invalid storage backend: '{}'. Expected 'memory' or 'file'",
                s
            )),
        }
    }
}

/// Session storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Directory for the file backend (defaults to the user data dir)
    #[serde(rename = "dataDir", alias = "data_dir", default)]
    pub data_dir: Option<String>,
    /// Sessions expire this long after their last update
    #[serde(rename = "sessionTtlSecs", alias = "session_ttl_secs", default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    /// How often expired keys are purged
    #[serde(rename = "sweepIntervalSecs", alias = "sweep_interval_secs", default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_backend() -> StorageBackend { StorageBackend::Memory }
fn default_session_ttl() -> u64 { 86_400 }
fn default_sweep_interval() -> u64 { 300 }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: None,
            session_ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl StorageConfig {
    /// Resolve the directory used by the file backend
    pub fn resolved_data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("diagnostic-engine"),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; permissive when empty
    #[serde(rename = "corsOrigins", alias = "cors_origins", default)]
    pub cors_origins: Option<Vec<String>>,
}

fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3430 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            cors_origins: None,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| anyhow!("Failed to parse config: {}", e))
    }

    /// Reject values the router and scorer cannot work with
    pub fn validate(&self) -> Result<()> {
        let percent = |name: &str, v: f64| -> Result<()> {
            if !(0.0..=100.0).contains(&v) {
                return Err(anyhow!("{} must be between 0 and 100, got {}", name, v));
            }
            Ok(())
        };

        for block in InterviewBlock::all() {
            percent(
                &format!("interview.blockCompleteness.{}", block),
                self.interview.block_completeness.get(*block),
            )?;
            if self.scoring.block_weights.get(*block) <= 0.0 {
                return Err(anyhow!("scoring.blockWeights.{} must be positive", block));
            }
        }
        percent("interview.terminalCompleteness", self.interview.terminal_completeness)?;
        percent("scoring.highConfidenceAt", self.scoring.high_confidence_at)?;
        percent("scoring.mediumConfidenceAt", self.scoring.medium_confidence_at)?;

        if self.scoring.medium_confidence_at > self.scoring.high_confidence_at {
            return Err(anyhow!(
                "scoring.mediumConfidenceAt must not exceed scoring.highConfidenceAt"
            ));
        }
        if self.interview.risk_area_count == 0 {
            return Err(anyhow!("interview.riskAreaCount must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.interview.signal_threshold) {
            return Err(anyhow!("interview.signalThreshold must be between 0 and 1"));
        }
        if self.model.timeout_secs == 0 {
            return Err(anyhow!("model.timeoutSecs must be positive"));
        }
        Ok(())
    }
}

/// Command-line overrides, applied on top of file configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub backend: Option<StorageBackend>,
    pub data_dir: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut EngineConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref bind) = self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
        if let Some(ref dir) = self.data_dir {
            config.storage.data_dir = Some(dir.clone());
        }
    }
}

/// Config loader
/// Priority order: explicit path -> project file -> global file -> defaults
pub struct ConfigLoader {
    explicit_path: Option<PathBuf>,
    project_path: Option<PathBuf>,
    global_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            explicit_path: None,
            project_path: Some(PathBuf::from(PROJECT_CONFIG_FILE)),
            global_path: Self::get_global_config_path(),
        }
    }

    /// Use an explicit config file; it must exist
    pub fn with_path(mut self, path: &Path) -> Self {
        self.explicit_path = Some(path.to_path_buf());
        self
    }

    /// Look for the project file in a directory other than the working directory
    pub fn with_project_dir(mut self, dir: &Path) -> Self {
        self.project_path = Some(dir.join(PROJECT_CONFIG_FILE));
        self
    }

    /// Disable the global config lookup (used by tests)
    pub fn without_global(mut self) -> Self {
        self.global_path = None;
        self
    }

    /// Get the global config path
    fn get_global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("diagnostic-engine").join("config.toml"))
    }

    /// Resolve and load the configuration
    pub fn load(&self) -> Result<EngineConfig> {
        if let Some(ref path) = self.explicit_path {
            if !path.exists() {
                return Err(anyhow!("Config file not found: {:?}", path));
            }
            return self.load_file(path);
        }

        for candidate in [&self.project_path, &self.global_path].into_iter().flatten() {
            if candidate.exists() {
                return self.load_file(candidate);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(EngineConfig::default())
    }

    fn load_file(&self, path: &Path) -> Result<EngineConfig> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config {:?}: {}", path, e))?;
        let config = EngineConfig::from_toml(&content)?;
        config.validate()?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
