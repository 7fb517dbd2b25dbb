//! Breaker state machine.
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     consecutive_failures >= failure_threshold
//! Open     → HalfOpen: recovery_timeout elapsed since last transition
//! HalfOpen → Closed:   half-open successes >= success_threshold
//! HalfOpen → Open:     any countable failure
//! ```
//!
//! `BreakerCore` is plain data mutated under the breaker's lock; it performs
//! no I/O and reads time only through the `now` arguments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::circuit_breaker::BreakerConfig;
use super::counters::{BreakerMetrics, TransitionReason, TransitionRecord};

/// States of the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    /// Gauge encoding: 0 closed, 1 half-open, 2 open.
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }

    /// Whether `self → to` is one of the edges calls can drive.
    ///
    /// A manual reset may close the breaker from any state; those records
    /// carry [`TransitionReason::ManualReset`] and sit outside this table.
    pub fn can_transition_to(&self, to: CircuitState) -> bool {
        matches!(
            (self, to),
            (CircuitState::Closed, CircuitState::Open)
                | (CircuitState::Open, CircuitState::HalfOpen)
                | (CircuitState::HalfOpen, CircuitState::Closed)
                | (CircuitState::HalfOpen, CircuitState::Open)
        )
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the admission check at the start of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The operation may run. Carries the Open → HalfOpen transition if one
    /// happened on the way in.
    Proceed(Option<TransitionRecord>),
    /// The circuit is open; try again after the given duration.
    Reject { retry_after: Duration },
}

/// Mutable state of one breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerCore {
    pub state: CircuitState,
    /// Epoch milliseconds of the last state change (creation for a fresh breaker).
    pub last_transition_at: u64,
    pub half_open_successes: u32,
    pub metrics: BreakerMetrics,
}

impl BreakerCore {
    /// A fresh, closed breaker.
    pub fn new(now: u64) -> Self {
        Self {
            state: CircuitState::Closed,
            last_transition_at: now,
            half_open_successes: 0,
            metrics: BreakerMetrics::default(),
        }
    }

    /// Decide whether a call may proceed.
    pub fn admit(&mut self, now: u64, config: &BreakerConfig) -> Admission {
        if self.state != CircuitState::Open {
            return Admission::Proceed(None);
        }

        let elapsed = Duration::from_millis(now.saturating_sub(self.last_transition_at));
        if elapsed < config.recovery_timeout {
            self.metrics.record_rejection();
            return Admission::Reject {
                retry_after: config.recovery_timeout - elapsed,
            };
        }

        let record = self.transition(
            CircuitState::HalfOpen,
            now,
            TransitionReason::RecoveryTimeoutElapsed,
        );
        Admission::Proceed(Some(record))
    }

    /// Account a successful call.
    pub fn on_success(&mut self, now: u64, config: &BreakerConfig) -> Option<TransitionRecord> {
        self.metrics.record_success(now);
        match self.state {
            CircuitState::Closed => {
                self.metrics.consecutive_failures = 0;
                None
            }
            CircuitState::HalfOpen => {
                self.half_open_successes += 1;
                if self.half_open_successes >= config.success_threshold {
                    Some(self.transition(
                        CircuitState::Closed,
                        now,
                        TransitionReason::SuccessThresholdReached,
                    ))
                } else {
                    None
                }
            }
            CircuitState::Open => None,
        }
    }

    /// Account a countable failure.
    pub fn on_failure(&mut self, now: u64, config: &BreakerConfig) -> Option<TransitionRecord> {
        self.metrics.record_failure(now);
        match self.state {
            CircuitState::Closed
                if self.metrics.consecutive_failures >= config.failure_threshold =>
            {
                Some(self.transition(
                    CircuitState::Open,
                    now,
                    TransitionReason::FailureThresholdReached,
                ))
            }
            CircuitState::HalfOpen => Some(self.transition(
                CircuitState::Open,
                now,
                TransitionReason::HalfOpenProbeFailed,
            )),
            _ => None,
        }
    }

    /// Force the breaker closed and zero its counters. History is kept.
    ///
    /// The recorded edge (`Open → Closed` included) bypasses
    /// [`CircuitState::can_transition_to`].
    pub fn reset(&mut self, now: u64) -> Option<TransitionRecord> {
        let history = std::mem::take(&mut self.metrics.recent_transitions);
        let from = self.state;
        *self = Self::new(now);
        self.metrics.recent_transitions = history;

        if from == CircuitState::Closed {
            return None;
        }
        let record = TransitionRecord {
            from,
            to: CircuitState::Closed,
            at: now,
            reason: TransitionReason::ManualReset,
        };
        self.metrics.record_transition(record);
        Some(record)
    }

    fn transition(
        &mut self,
        to: CircuitState,
        now: u64,
        reason: TransitionReason,
    ) -> TransitionRecord {
        debug_assert!(self.state.can_transition_to(to));
        let record = TransitionRecord {
            from: self.state,
            to,
            at: now,
            reason,
        };

        self.state = to;
        self.last_transition_at = now;
        self.half_open_successes = 0;
        if to == CircuitState::Closed {
            self.metrics.consecutive_failures = 0;
        }
        self.metrics.record_transition(record);
        record
    }
}
