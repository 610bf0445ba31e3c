// Graceful shutdown handling for signal trapping

use anyhow::Result;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Shared shutdown state across the application
#[derive(Clone)]
pub struct ShutdownState {
    /// Flips to true once shutdown is requested; waiters subscribe to it
    shutdown_requested: Arc<watch::Sender<bool>>,
    /// Flag indicating cleanup has completed
    cleanup_complete: Arc<AtomicBool>,
}

impl ShutdownState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            shutdown_requested: Arc::new(tx),
            cleanup_complete: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request_shutdown(&self) {
        if !self.shutdown_requested.send_replace(true) {
            log::info!("Shutdown requested");
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.shutdown_requested.borrow()
    }

    pub fn mark_cleanup_complete(&self) {
        self.cleanup_complete.store(true, Ordering::SeqCst);
        log::info!("Cleanup complete");
    }

    pub fn is_cleanup_complete(&self) -> bool {
        self.cleanup_complete.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been requested
    pub async fn wait(&self) {
        let mut rx = self.shutdown_requested.subscribe();
        // The sender lives in self, so the channel cannot close while waiting
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of graceful shutdown cleanup
#[derive(Debug, Clone, Default)]
pub struct ShutdownResult {
    /// Expired sessions removed on the way out
    pub expired_purged: usize,
    /// Any errors encountered during cleanup
    pub errors: Vec<String>,
}

impl ShutdownResult {
    /// Check if shutdown was clean (no errors)
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Graceful shutdown handler
pub struct ShutdownHandler {
    state: ShutdownState,
}

impl ShutdownHandler {
    pub fn new() -> Self {
        Self {
            state: ShutdownState::new(),
        }
    }

    pub fn with_state(state: ShutdownState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &ShutdownState {
        &self.state
    }

    /// Run `cleanup` once the server has stopped accepting requests
    pub async fn handle_shutdown<F, Fut>(&self, cleanup: F) -> Result<ShutdownResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ShutdownResult>>,
    {
        self.state.request_shutdown();

        log::info!("Starting graceful shutdown...");

        let result = cleanup().await?;

        log::info!(
            "Shutdown complete: {} expired sessions purged",
            result.expired_purged
        );
        for error in &result.errors {
            log::warn!("Cleanup error: {}", error);
        }

        self.state.mark_cleanup_complete();

        Ok(result)
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Register signal handlers for graceful shutdown
/// This sets up handlers for SIGINT (Ctrl+C), SIGTERM, and SIGHUP
#[cfg(unix)]
pub fn register_signal_handlers(state: ShutdownState) -> Result<()> {
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;
    use std::thread;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])
        .map_err(|e| anyhow::anyhow!("Failed to register signal handlers: {}", e))?;

    thread::spawn(move || {
        for signal in signals.forever() {
            match signal {
                SIGINT => log::info!("Received SIGINT (Ctrl+C)"),
                SIGTERM => log::info!("Received SIGTERM"),
                SIGHUP => log::info!("Received SIGHUP"),
                _ => continue,
            }
            state.request_shutdown();
        }
    });

    log::info!("Signal handlers registered (SIGINT, SIGTERM, SIGHUP)");
    Ok(())
}

/// Register signal handlers for Windows
#[cfg(windows)]
pub fn register_signal_handlers(state: ShutdownState) -> Result<()> {
    ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C");
        state.request_shutdown();
    })
    .map_err(|e| anyhow::anyhow!("Failed to register Ctrl+C handler: {}", e))?;

    log::info!("Signal handler registered (Ctrl+C)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_state_new() {
        let state = ShutdownState::new();
        assert!(!state.is_shutdown_requested());
        assert!(!state.is_cleanup_complete());
    }

    #[test]
    fn test_shutdown_state_clone() {
        let state1 = ShutdownState::new();
        let state2 = state1.clone();

        state1.request_shutdown();
        assert!(state2.is_shutdown_requested());
    }

    #[test]
    fn test_shutdown_result_is_clean() {
        let mut result = ShutdownResult::default();
        assert!(result.is_clean());

        result.errors.push("store unavailable".to_string());
        assert!(!result.is_clean());
    }

    #[tokio::test]
    async fn test_wait_returns_after_request() {
        let state = ShutdownState::new();
        let waiter = state.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });
        state.request_shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_requested() {
        let state = ShutdownState::new();
        state.request_shutdown();
        state.request_shutdown();
        tokio::time::timeout(std::time::Duration::from_millis(50), state.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_is_woken_without_polling() {
        let state = ShutdownState::new();
        let waiter = state.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        state.request_shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_shutdown_runs_cleanup() {
        let handler = ShutdownHandler::new();

        let result = handler
            .handle_shutdown(|| async {
                Ok(ShutdownResult {
                    expired_purged: 4,
                    errors: vec![],
                })
            })
            .await
            .unwrap();

        assert_eq!(result.expired_purged, 4);
        assert!(result.is_clean());
        assert!(handler.state().is_shutdown_requested());
        assert!(handler.state().is_cleanup_complete());
    }
}
