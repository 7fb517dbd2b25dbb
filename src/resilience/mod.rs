//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Caller:
//!     → registry.rs (name → breaker, created on first use)
//!     → circuit_breaker.rs (lock, load snapshot, admit)
//!     → timeouts.rs (enforce call deadline)
//!     → state.rs (account outcome, transition)
//!     → circuit_breaker.rs (publish view, save snapshot, unlock)
//! ```
//!
//! # Design Decisions
//! - One breaker per logical dependency name, not per connection
//! - Every protected call has a deadline; overruns count as failures
//! - Failure classification is an injected predicate that counts everything
//!   by default
//! - Retries are not done here; a retry loop belongs inside the protected
//!   operation

pub mod circuit_breaker;
pub mod classifier;
pub mod clock;
pub mod counters;
pub mod errors;
pub mod registry;
pub mod state;
pub mod timeouts;

pub use circuit_breaker::{
    BreakerConfig, BreakerMetricsView, BreakerOptions, CircuitBreaker, Persistence,
};
pub use classifier::FailureClassifier;
pub use clock::{Clock, ManualClock, SystemClock};
pub use counters::{BreakerMetrics, TransitionReason, TransitionRecord, MAX_RECENT_TRANSITIONS};
pub use errors::{BreakerError, FailureKind};
pub use registry::BreakerRegistry;
pub use state::{BreakerCore, CircuitState};
