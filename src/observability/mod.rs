//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, store and health monitor produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`breaker`, `from`, `to`) on every state change
//! - Store outages log at warn, never error: they are an expected mode
//! - Metrics are cheap and no-ops without an exporter

pub mod logging;
pub mod metrics;
