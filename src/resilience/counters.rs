//! Per-breaker request counters and transition history.
//!
//! # Invariants
//! - `total_requests == successful_requests + failed_requests`
//! - `recent_transitions` never holds more than [`MAX_RECENT_TRANSITIONS`]
//!
//! Short-circuited calls are tracked in `rejected_requests` and are not part
//! of `total_requests`, since the operation never ran.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::state::CircuitState;

/// Cap on the transition history kept per breaker.
pub const MAX_RECENT_TRANSITIONS: usize = 10;

/// Why a transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    FailureThresholdReached,
    RecoveryTimeoutElapsed,
    SuccessThresholdReached,
    HalfOpenProbeFailed,
    ManualReset,
}

/// One entry of the bounded transition history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: CircuitState,
    pub to: CircuitState,
    /// Epoch milliseconds.
    pub at: u64,
    pub reason: TransitionReason,
}

/// Counters owned by one breaker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub consecutive_failures: u32,
    pub rejected_requests: u64,
    pub last_failure_at: Option<u64>,
    pub last_success_at: Option<u64>,
    /// The last [`MAX_RECENT_TRANSITIONS`] state changes, oldest first.
    /// Individual failures are not recorded here; see the counters and
    /// `last_failure_at`.
    pub recent_transitions: VecDeque<TransitionRecord>,
}

impl BreakerMetrics {
    pub fn record_success(&mut self, now: u64) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.last_success_at = Some(now);
    }

    pub fn record_failure(&mut self, now: u64) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(now);
    }

    pub fn record_rejection(&mut self) {
        self.rejected_requests += 1;
    }

    pub fn record_transition(&mut self, record: TransitionRecord) {
        if self.recent_transitions.len() == MAX_RECENT_TRANSITIONS {
            self.recent_transitions.pop_front();
        }
        self.recent_transitions.push_back(record);
    }

    /// Fraction of executed requests that succeeded. 1.0 when nothing ran yet.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }
}
