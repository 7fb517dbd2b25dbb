//! Breaker registry.
//!
//! Process-wide map from dependency name to its breaker, created lazily on
//! first use. Constructed once at startup and passed to whoever needs it;
//! there is no global instance.
//!
//! # Design Decisions
//! - DashMap entry API makes first use race-free: concurrent callers for a
//!   new name end up with the same `Arc<CircuitBreaker>`
//! - A cached breaker is returned as-is; later configs for the same name are
//!   ignored (use `apply_settings` to retune)
//! - A config that fails validation keeps its classifier but takes its
//!   thresholds and timeouts from the registry settings
//! - `flush` persists every breaker on shutdown

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;

use crate::config::BreakerSettings;
use crate::health::HealthReporter;
use crate::resilience::circuit_breaker::{
    BreakerConfig, BreakerMetricsView, BreakerOptions, CircuitBreaker, Persistence,
};
use crate::resilience::clock::{Clock, SystemClock};
use crate::store::{StateStore, StoreError};

/// Lazily populated set of breakers sharing one store.
#[derive(Debug)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    store: Arc<dyn StateStore>,
    settings: ArcSwap<BreakerSettings>,
    options: BreakerOptions,
}

impl BreakerRegistry {
    pub fn new(store: Arc<dyn StateStore>, settings: BreakerSettings) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn StateStore>,
        settings: BreakerSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let options = BreakerOptions {
            clock,
            persistence: Persistence::from(&settings.store),
            health: HealthReporter::from(&settings.health),
        };
        Self {
            breakers: DashMap::new(),
            store,
            settings: ArcSwap::from_pointee(settings),
            options,
        }
    }

    /// The cached breaker for `name`, or a new one built from `config`.
    pub fn get_or_create(&self, name: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }

        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let mut config = BreakerConfig {
                    name: name.to_string(),
                    ..config
                };
                if let Err(errors) = config.validate() {
                    let errors: Vec<String> = errors.iter().map(ToString::to_string).collect();
                    tracing::error!(
                        breaker = %name,
                        errors = %errors.join(", "),
                        "Invalid breaker config, using configured tuning instead"
                    );
                    config = config.with_tuning(&self.settings.load().tuning_for(name));
                }
                tracing::debug!(
                    breaker = %name,
                    failure_threshold = config.failure_threshold,
                    recovery_timeout_ms = config.recovery_timeout.as_millis() as u64,
                    "Registering circuit breaker"
                );
                Arc::new(CircuitBreaker::with_options(
                    config,
                    self.store.clone(),
                    self.options.clone(),
                ))
            })
            .clone()
    }

    /// Breaker for `name` configured from the registry settings.
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        let config = self.settings.load().config_for(name);
        self.get_or_create(name, config)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| b.clone())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Registered breakers, sorted by name.
    pub fn all(&self) -> Vec<Arc<CircuitBreaker>> {
        let mut all: Vec<_> = self.breakers.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    pub fn all_metrics(&self) -> Vec<BreakerMetricsView> {
        self.all().iter().map(|b| b.metrics()).collect()
    }

    pub fn settings(&self) -> Arc<BreakerSettings> {
        self.settings.load_full()
    }

    /// Adopt new settings and retune live breakers. Store and health settings
    /// only apply to breakers created afterwards.
    pub fn apply_settings(&self, settings: BreakerSettings) {
        for breaker in self.all() {
            breaker.reconfigure(&settings.tuning_for(breaker.name()));
        }
        tracing::info!(breakers = self.len(), "Applied breaker settings");
        self.settings.store(Arc::new(settings));
    }

    /// Persist every breaker. Returns the names that failed.
    pub async fn flush(&self) -> Vec<(String, StoreError)> {
        let mut failures = Vec::new();
        for breaker in self.all() {
            if let Err(e) = breaker.persist().await {
                failures.push((breaker.name().to_string(), e));
            }
        }
        if failures.is_empty() {
            tracing::info!(breakers = self.len(), "Flushed breaker state");
        } else {
            tracing::warn!(failed = failures.len(), "Some breaker state could not be flushed");
        }
        failures
    }
}
