//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dependency_breaker::config::BreakerSettings;
use dependency_breaker::resilience::{BreakerRegistry, ManualClock};
use dependency_breaker::store::MemoryStore;

/// Error returned by the fake dependency.
#[derive(Debug, Clone, thiserror::Error)]
#[error("dependency unavailable")]
pub struct DependencyError;

/// Error the fake dependency returns for bad input; not a health signal.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid request")]
pub struct BadRequest;

/// Start of every test clock, an arbitrary fixed epoch.
pub const T0: u64 = 1_700_000_000_000;

/// Registry on a manual clock with a shared in-memory store.
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub registry: Arc<BreakerRegistry>,
}

impl Harness {
    pub fn new(settings: BreakerSettings) -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let registry = Arc::new(BreakerRegistry::with_clock(
            store.clone(),
            settings,
            clock.clone(),
        ));
        Self {
            clock,
            store,
            registry,
        }
    }

    /// A second "process" sharing this harness's store and clock.
    pub fn peer(&self, settings: BreakerSettings) -> Arc<BreakerRegistry> {
        Arc::new(BreakerRegistry::with_clock(
            self.store.clone(),
            settings,
            self.clock.clone(),
        ))
    }
}

/// Counts how often the fake dependency was actually invoked.
#[derive(Debug, Default, Clone)]
pub struct Invocations(Arc<AtomicU32>);

impl Invocations {
    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    /// A dependency that answers `Ok(())` or `Err(DependencyError)`.
    pub async fn dependency(&self, healthy: bool) -> Result<(), DependencyError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        if healthy {
            Ok(())
        } else {
            Err(DependencyError)
        }
    }
}

/// Fresh empty directory, removed when dropped.
pub fn temp_dir(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new().prefix(prefix).tempdir().unwrap()
}
