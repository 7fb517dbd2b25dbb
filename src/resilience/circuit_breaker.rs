//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: probing whether the dependency recovered
//!
//! # Call sequence
//! ```text
//! lock(breaker)
//!     → load snapshot from store, merge into local state
//!     → admit (reject while open and recovery timeout not elapsed)
//!     → run operation under call_timeout
//!     → account outcome, maybe transition
//!     → publish view, save snapshot
//! unlock
//! ```
//!
//! The whole sequence runs under one async mutex per breaker, so concurrent
//! callers of the same dependency cannot double-count an outcome or race a
//! transition. Different breakers never share a lock. Readers of metrics use
//! a view published at the end of each call and never wait on the lock.
//!
//! Local changes the store has not acknowledged (a failed save, a cancelled
//! call) mark the state dirty. A dirty breaker writes its state through on
//! the next load instead of adopting the older stored snapshot.

use arc_swap::ArcSwap;
use serde::Serialize;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time;

use crate::config::validation::{validate_tuning, ValidationError};
use crate::config::{BreakerTuning, StoreConfig};
use crate::health::{HealthReport, HealthReporter};
use crate::observability::metrics;
use crate::resilience::classifier::FailureClassifier;
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::counters::TransitionRecord;
use crate::resilience::errors::{BreakerError, FailureKind};
use crate::resilience::state::{Admission, BreakerCore, CircuitState};
use crate::resilience::timeouts::{with_deadline, Deadline};
use crate::store::{StateSnapshot, StateStore, StoreError};

/// Configuration of one breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Dependency name; also the store key.
    pub name: String,
    /// Consecutive countable failures that open the circuit.
    pub failure_threshold: u32,
    /// Minimum time the circuit stays open before a probe.
    pub recovery_timeout: Duration,
    /// Half-open successes needed to close the circuit.
    pub success_threshold: u32,
    /// Deadline for each protected call.
    pub call_timeout: Duration,
    /// Which operation errors count toward the threshold.
    pub classifier: FailureClassifier,
}

impl BreakerConfig {
    /// Configuration with default tuning and a count-everything classifier.
    pub fn new(name: impl Into<String>) -> Self {
        let tuning = BreakerTuning::default();
        Self {
            name: name.into(),
            failure_threshold: tuning.failure_threshold,
            recovery_timeout: tuning.recovery_timeout(),
            success_threshold: tuning.success_threshold,
            call_timeout: tuning.call_timeout(),
            classifier: FailureClassifier::default(),
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_classifier(mut self, classifier: FailureClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replace thresholds and timeouts, keeping name and classifier.
    pub fn with_tuning(mut self, tuning: &BreakerTuning) -> Self {
        self.failure_threshold = tuning.failure_threshold;
        self.recovery_timeout = tuning.recovery_timeout();
        self.success_threshold = tuning.success_threshold;
        self.call_timeout = tuning.call_timeout();
        self
    }

    pub fn tuning(&self) -> BreakerTuning {
        BreakerTuning {
            failure_threshold: self.failure_threshold,
            recovery_timeout_ms: self.recovery_timeout.as_millis() as u64,
            success_threshold: self.success_threshold,
            call_timeout_ms: self.call_timeout.as_millis() as u64,
        }
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(ValidationError::new("name", "must not be empty"));
        }
        validate_tuning(&self.name, &self.tuning(), &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Store interaction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persistence {
    /// Idle TTL applied on every save.
    pub ttl: Duration,
    /// Upper bound on each load or save.
    pub timeout: Duration,
}

impl Default for Persistence {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for Persistence {
    fn from(config: &StoreConfig) -> Self {
        Self {
            ttl: config.ttl(),
            timeout: config.timeout(),
        }
    }
}

/// Collaborators shared by the breakers of one registry.
#[derive(Debug, Clone)]
pub struct BreakerOptions {
    pub clock: Arc<dyn Clock>,
    pub persistence: Persistence,
    pub health: HealthReporter,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            persistence: Persistence::default(),
            health: HealthReporter::default(),
        }
    }
}

/// Read-only metrics export of one breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerMetricsView {
    pub name: String,
    pub state: CircuitState,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub consecutive_failures: u32,
    pub rejected_requests: u64,
    pub success_rate: f64,
    pub last_failure_at: Option<u64>,
    pub last_success_at: Option<u64>,
    pub last_transition_at: u64,
    pub recent_transitions: Vec<TransitionRecord>,
}

impl BreakerMetricsView {
    pub fn from_core(name: &str, core: &BreakerCore) -> Self {
        let m = &core.metrics;
        Self {
            name: name.to_string(),
            state: core.state,
            total_requests: m.total_requests,
            successful_requests: m.successful_requests,
            failed_requests: m.failed_requests,
            consecutive_failures: m.consecutive_failures,
            rejected_requests: m.rejected_requests,
            success_rate: m.success_rate(),
            last_failure_at: m.last_failure_at,
            last_success_at: m.last_success_at,
            last_transition_at: core.last_transition_at,
            recent_transitions: m.recent_transitions.iter().copied().collect(),
        }
    }
}

#[derive(Debug)]
struct CoreSlot {
    core: BreakerCore,
    /// Whether the store is known to hold our latest state.
    persisted: bool,
    /// Local changes not yet acknowledged by the store.
    dirty: bool,
}

/// Accounted result of one executed call.
#[derive(Debug, Clone, Copy)]
enum Outcome {
    Success,
    Failure(FailureKind),
    /// Error rejected by the classifier; counters untouched.
    Ignored,
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure(FailureKind::Operation) => "failure",
            Outcome::Failure(FailureKind::Timeout) => "timeout",
            Outcome::Failure(FailureKind::Cancelled) => "cancelled",
            Outcome::Ignored => "ignored_error",
        }
    }
}

/// A protected dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: ArcSwap<BreakerConfig>,
    slot: Mutex<CoreSlot>,
    view: ArcSwap<BreakerMetricsView>,
    store: Arc<dyn StateStore>,
    options: BreakerOptions,
    store_degraded: AtomicBool,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig, store: Arc<dyn StateStore>) -> Self {
        Self::with_options(config, store, BreakerOptions::default())
    }

    pub fn with_options(
        config: BreakerConfig,
        store: Arc<dyn StateStore>,
        options: BreakerOptions,
    ) -> Self {
        let name = config.name.clone();
        let core = BreakerCore::new(options.clock.now_millis());
        let view = BreakerMetricsView::from_core(&name, &core);
        metrics::record_state(&name, core.state);

        Self {
            name,
            config: ArcSwap::from_pointee(config),
            slot: Mutex::new(CoreSlot {
                core,
                persisted: false,
                dirty: false,
            }),
            view: ArcSwap::from_pointee(view),
            store,
            options,
            store_degraded: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> Arc<BreakerConfig> {
        self.config.load_full()
    }

    /// State as of the last completed call.
    pub fn state(&self) -> CircuitState {
        self.view.load().state
    }

    /// Metrics as of the last completed call.
    pub fn metrics(&self) -> BreakerMetricsView {
        self.view.load().as_ref().clone()
    }

    pub fn health(&self) -> HealthReport {
        self.options.health.health_of(&self.view.load())
    }

    /// True while the last store interaction failed.
    pub fn is_store_degraded(&self) -> bool {
        self.store_degraded.load(Ordering::Relaxed)
    }

    /// Run `operation` through the breaker.
    ///
    /// Returns [`BreakerError::Open`] without invoking `operation` while the
    /// circuit is open. Operation errors come back unchanged in
    /// [`BreakerError::Operation`].
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        let config = self.config.load_full();
        let mut slot = self.slot.lock().await;
        self.sync_from_store(&mut slot).await;

        let now = self.options.clock.now_millis();
        match slot.core.admit(now, &config) {
            Admission::Reject { retry_after } => {
                slot.dirty = true;
                metrics::record_rejection(&self.name);
                tracing::debug!(
                    breaker = %self.name,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Circuit open, rejecting call"
                );
                self.publish(&slot.core);
                let _ = self.persist_locked(&mut slot).await;
                return Err(BreakerError::Open {
                    name: self.name.clone(),
                    retry_after,
                });
            }
            Admission::Proceed(entered) => {
                if let Some(record) = entered {
                    slot.dirty = true;
                    self.log_transition(&record);
                }
            }
        }

        let mut pending = PendingCall {
            breaker: self,
            slot,
            config: config.clone(),
            armed: true,
        };

        let result = match with_deadline(config.call_timeout, operation()).await {
            Deadline::Completed(value) => {
                pending.account(Outcome::Success);
                Ok(value)
            }
            Deadline::Failed(err) => {
                if config.classifier.is_countable(&err) {
                    pending.account(Outcome::Failure(FailureKind::Operation));
                } else {
                    pending.account(Outcome::Ignored);
                }
                Err(BreakerError::Operation(err))
            }
            Deadline::TimedOut => {
                pending.account(Outcome::Failure(FailureKind::Timeout));
                Err(BreakerError::Timeout {
                    name: self.name.clone(),
                    timeout: config.call_timeout,
                })
            }
        };

        let _ = self.persist_locked(&mut pending.slot).await;
        result
    }

    /// Swap thresholds and timeouts. Applies from the next call on.
    pub fn reconfigure(&self, tuning: &BreakerTuning) {
        let current = self.config.load_full();
        if current.tuning() == *tuning {
            return;
        }
        let next = current.as_ref().clone().with_tuning(tuning);
        tracing::info!(
            breaker = %self.name,
            failure_threshold = next.failure_threshold,
            recovery_timeout_ms = tuning.recovery_timeout_ms,
            success_threshold = next.success_threshold,
            call_timeout_ms = tuning.call_timeout_ms,
            "Breaker reconfigured"
        );
        self.config.store(Arc::new(next));
    }

    /// Force the circuit closed with zeroed counters and persist it.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().await;
        let now = self.options.clock.now_millis();
        match slot.core.reset(now) {
            Some(record) => self.log_transition(&record),
            None => tracing::info!(breaker = %self.name, "Breaker counters reset"),
        }
        slot.dirty = true;
        self.publish(&slot.core);
        self.persist_locked(&mut slot).await
    }

    /// Pull the latest shared state without running a call.
    ///
    /// Skipped (returns false) while a call holds the breaker.
    pub async fn refresh(&self) -> bool {
        let Ok(mut slot) = self.slot.try_lock() else {
            return false;
        };
        self.sync_from_store(&mut slot).await;
        self.publish(&slot.core);
        true
    }

    /// Current snapshot, waiting for any in-flight call.
    pub async fn snapshot(&self) -> StateSnapshot {
        let slot = self.slot.lock().await;
        StateSnapshot::from_core(&slot.core)
    }

    /// Write the current state to the store.
    pub async fn persist(&self) -> Result<(), StoreError> {
        let mut slot = self.slot.lock().await;
        self.persist_locked(&mut slot).await
    }

    async fn sync_from_store(&self, slot: &mut CoreSlot) {
        if slot.dirty {
            if self.persist_locked(slot).await.is_ok() {
                tracing::debug!(breaker = %self.name, "Wrote pending local state through");
            }
            return;
        }

        let loaded = match time::timeout(
            self.options.persistence.timeout,
            self.store.load(&self.name),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::unavailable("load timed out")),
        };

        match loaded {
            Ok(Some(snapshot)) => {
                self.store_recovered();
                let core = snapshot.into_core();
                if core.state != slot.core.state {
                    tracing::info!(
                        breaker = %self.name,
                        local = %slot.core.state,
                        shared = %core.state,
                        "Adopting breaker state from store"
                    );
                    metrics::record_state(&self.name, core.state);
                }
                slot.core = core;
                slot.persisted = true;
            }
            Ok(None) => {
                self.store_recovered();
                if slot.persisted {
                    tracing::info!(breaker = %self.name, "Breaker snapshot expired, starting fresh");
                    slot.core = BreakerCore::new(self.options.clock.now_millis());
                    slot.persisted = false;
                    metrics::record_state(&self.name, slot.core.state);
                }
            }
            Err(e) => self.store_failed("load", &e),
        }
    }

    async fn persist_locked(&self, slot: &mut CoreSlot) -> Result<(), StoreError> {
        let snapshot = StateSnapshot::from_core(&slot.core);
        let persistence = self.options.persistence;
        let saved = match time::timeout(
            persistence.timeout,
            self.store.save(&self.name, &snapshot, persistence.ttl),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::unavailable("save timed out")),
        };

        match saved {
            Ok(()) => {
                self.store_recovered();
                slot.persisted = true;
                slot.dirty = false;
                Ok(())
            }
            Err(e) => {
                self.store_failed("save", &e);
                slot.persisted = false;
                slot.dirty = true;
                Err(e)
            }
        }
    }

    fn store_failed(&self, op: &'static str, err: &StoreError) {
        metrics::record_store_error(op);
        if !self.store_degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                breaker = %self.name,
                op,
                error = %err,
                "State store unavailable, continuing with in-memory state"
            );
        } else {
            tracing::debug!(breaker = %self.name, op, error = %err, "State store still unavailable");
        }
    }

    fn store_recovered(&self) {
        if self.store_degraded.swap(false, Ordering::Relaxed) {
            tracing::info!(breaker = %self.name, "State store reachable again");
        }
    }

    fn publish(&self, core: &BreakerCore) {
        self.view
            .store(Arc::new(BreakerMetricsView::from_core(&self.name, core)));
    }

    fn log_transition(&self, record: &TransitionRecord) {
        match record.to {
            CircuitState::Open => tracing::warn!(
                breaker = %self.name,
                from = %record.from,
                reason = ?record.reason,
                "Circuit opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                breaker = %self.name,
                from = %record.from,
                "Circuit half-open, probing dependency"
            ),
            CircuitState::Closed => tracing::info!(
                breaker = %self.name,
                from = %record.from,
                reason = ?record.reason,
                "Circuit closed"
            ),
        }
        metrics::record_transition(&self.name, record.to);
    }
}

/// Holds the breaker lock while the operation runs.
///
/// If the call future is dropped before the outcome is accounted, the drop
/// accounts it as a cancelled failure so every admitted call is counted
/// exactly once. The state stays dirty until the next load or flush writes
/// it through.
struct PendingCall<'a> {
    breaker: &'a CircuitBreaker,
    slot: MutexGuard<'a, CoreSlot>,
    config: Arc<BreakerConfig>,
    armed: bool,
}

impl PendingCall<'_> {
    fn account(&mut self, outcome: Outcome) {
        self.armed = false;
        let breaker = self.breaker;
        let now = breaker.options.clock.now_millis();
        let slot = &mut *self.slot;
        let core = &mut slot.core;

        let transition = match outcome {
            Outcome::Success => {
                slot.dirty = true;
                core.on_success(now, &self.config)
            }
            Outcome::Failure(kind) => {
                slot.dirty = true;
                let transition = core.on_failure(now, &self.config);
                tracing::debug!(
                    breaker = %breaker.name,
                    kind = kind.as_str(),
                    consecutive_failures = core.metrics.consecutive_failures,
                    "Counted failure"
                );
                transition
            }
            Outcome::Ignored => None,
        };

        metrics::record_call(&breaker.name, outcome.label());
        if let Some(record) = transition {
            breaker.log_transition(&record);
        }
        breaker.publish(&self.slot.core);
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.account(Outcome::Failure(FailureKind::Cancelled));
        }
    }
}
