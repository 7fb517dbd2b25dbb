//! Shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::resilience::registry::BreakerRegistry;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to,
/// and flushes breaker state on the way out.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Only the first call broadcasts.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Stop background tasks, then persist every breaker within `deadline`.
    pub async fn drain(&self, registry: &BreakerRegistry, deadline: Duration) {
        self.trigger();
        match time::timeout(deadline, registry.flush()).await {
            Ok(failures) => {
                for (name, e) in failures {
                    tracing::warn!(breaker = %name, error = %e, "Breaker state not flushed");
                }
            }
            Err(_) => tracing::warn!(
                deadline_ms = deadline.as_millis() as u64,
                "Breaker flush exceeded shutdown deadline"
            ),
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerSettings;
    use crate::store::{MemoryStore, StateStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_trigger_broadcasts_once() {
        let shutdown = Shutdown::new();
        let mut rx = shutdown.subscribe();

        shutdown.trigger();
        shutdown.trigger();

        assert!(shutdown.is_triggered());
        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_drain_flushes_registry() {
        let store = Arc::new(MemoryStore::new());
        let registry = BreakerRegistry::new(store.clone(), BreakerSettings::default());
        registry.breaker("ads-api");

        Shutdown::new()
            .drain(&registry, Duration::from_secs(1))
            .await;

        assert!(store.load("ads-api").await.unwrap().is_some());
    }
}
