//! Shutdown signal
//!
//! SIGINT and SIGTERM only set a shared flag; the frame loop polls it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between the signal listener and the loop
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Spawn a task that triggers the flag on SIGINT or SIGTERM.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn listen(&self) -> std::io::Result<tokio::task::JoinHandle<()>> {
        #[cfg(unix)]
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        let signal = self.clone();
        Ok(tokio::spawn(async move {
            #[cfg(unix)]
            let terminated = terminate.recv();
            #[cfg(not(unix))]
            let terminated = std::future::pending::<Option<()>>();

            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("Interrupt received"),
                _ = terminated => tracing::info!("Termination requested"),
            }
            signal.trigger();
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_is_shared() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!other.is_triggered());
        signal.trigger();
        assert!(other.is_triggered());
    }

    #[tokio::test]
    async fn test_listen_installs_handlers() {
        let signal = ShutdownSignal::new();
        let handle = signal.listen().unwrap();
        assert!(!signal.is_triggered());
        handle.abort();
    }
}
