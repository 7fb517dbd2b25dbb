//! Per-dependency circuit breakers with shared, persisted state.
//!
//! Wraps calls to unreliable external services, fails fast once a dependency
//! is judged unhealthy and probes for recovery on its own. Breaker state is
//! mirrored to a shared store so several processes converge on the same view
//! of a dependency.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dependency_breaker::{BreakerRegistry, BreakerSettings, MemoryStore};
//!
//! # async fn example() {
//! let registry = BreakerRegistry::new(Arc::new(MemoryStore::new()), BreakerSettings::default());
//! let result = registry
//!     .breaker("ads-api")
//!     .call(|| async { Ok::<_, std::io::Error>("campaigns") })
//!     .await;
//! # }
//! ```

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod store;

pub use config::BreakerSettings;
pub use health::{HealthReport, HealthReporter, HealthStatus};
pub use lifecycle::Shutdown;
pub use resilience::{
    BreakerConfig, BreakerError, BreakerMetricsView, BreakerRegistry, CircuitBreaker,
    CircuitState, FailureClassifier,
};
pub use store::{FileStore, MemoryStore, StateSnapshot, StateStore, StoreError};
