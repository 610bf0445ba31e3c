use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use diagnostic_engine_lib::config::{ConfigLoader, ConfigOverrides, EngineConfig, StorageBackend};
use diagnostic_engine_lib::interview::InterviewEngine;
use diagnostic_engine_lib::orchestration::ModelOrchestrator;
use diagnostic_engine_lib::server::{self, ServerAppState};
use diagnostic_engine_lib::shutdown::{
    register_signal_handlers, ShutdownHandler, ShutdownResult, ShutdownState,
};
use diagnostic_engine_lib::storage::{FileStore, KeyValueStore, MemoryStore};

/// Diagnostic Engine - adaptive business interviews with synthesized diagnostics
#[derive(Parser, Debug)]
#[command(name = "diagnostic-engine")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./diagnostic-engine.toml, then the user config dir)
    #[arg(long, env = "DIAGNOSTIC_ENGINE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to bind the server to
    #[arg(long, env = "DIAGNOSTIC_ENGINE_PORT")]
    port: Option<u16>,

    /// Address to bind the server to
    #[arg(long, env = "DIAGNOSTIC_ENGINE_BIND")]
    bind: Option<String>,

    /// Session store backend: memory or file
    #[arg(long = "store", env = "DIAGNOSTIC_ENGINE_STORE")]
    store: Option<StorageBackend>,

    /// Data directory for the file store
    #[arg(long, env = "DIAGNOSTIC_ENGINE_DATA_DIR")]
    data_dir: Option<String>,
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(ref path) = cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    ConfigOverrides {
        port: cli.port,
        bind: cli.bind.clone(),
        backend: cli.store,
        data_dir: cli.data_dir.clone(),
    }
    .apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn build_store(config: &EngineConfig) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    Ok(match config.storage.backend {
        StorageBackend::Memory => {
            log::info!("Using in-memory session store");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::File => {
            let dir = config.storage.resolved_data_dir();
            log::info!("Using file session store at {:?}", dir);
            Arc::new(FileStore::new(dir).map_err(|e| anyhow::anyhow!("{}", e))?)
        }
    })
}

/// Periodically drop expired sessions
fn spawn_sweeper(engine: Arc<InterviewEngine>, interval_secs: u64, shutdown: ShutdownState) {
    if interval_secs == 0 {
        log::info!("Expiry sweeper disabled");
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.tick().await;
        while !shutdown.is_shutdown_requested() {
            ticker.tick().await;
            match engine.purge_expired().await {
                Ok(0) => log::debug!("Expiry sweep: nothing to purge"),
                Ok(n) => log::info!("Expiry sweep: purged {} expired keys", n),
                Err(e) => log::warn!("Expiry sweep failed: {}", e),
            }
        }
    });
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli).context("Failed to load configuration")?;
    let store = build_store(&config)?;
    let client = ModelOrchestrator::client_from_config(&config.model);

    let engine = InterviewEngine::new(&config, store, client)
        .map_err(|e| anyhow::anyhow!("Failed to initialise engine: {}", e))?;

    let shutdown_state = ShutdownState::new();
    if let Err(e) = register_signal_handlers(shutdown_state.clone()) {
        log::warn!("Failed to register signal handlers: {}", e);
    }

    let state = ServerAppState::new(engine, shutdown_state.clone());
    spawn_sweeper(
        state.engine.clone(),
        config.storage.sweep_interval_secs,
        shutdown_state.clone(),
    );

    server::run_server(&config.server, state.clone())
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let engine = state.engine.clone();
    ShutdownHandler::with_state(shutdown_state)
        .handle_shutdown(|| async move {
            let mut result = ShutdownResult::default();
            match engine.purge_expired().await {
                Ok(n) => result.expired_purged = n,
                Err(e) => result.errors.push(e.to_string()),
            }
            Ok(result)
        })
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
