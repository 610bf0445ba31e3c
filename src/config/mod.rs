// Engine configuration: TOML file with defaults, plus command-line overrides

pub mod loader;

pub use loader::{
    BlockSettings, ConfigLoader, ConfigOverrides, EngineConfig, InterviewConfig, ModelConfig,
    ScoringConfig, ServerConfig, StorageBackend, StorageConfig,
};
