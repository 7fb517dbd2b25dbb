//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! reporter.rs:
//!     BreakerMetricsView → HealthReport { status, message }
//!
//! monitor.rs:
//!     Periodic timer
//!     → refresh each breaker from the store
//!     → reporter.rs
//!     → health gauge + log on status change
//! ```
//!
//! # Design Decisions
//! - Health is derived, never stored
//! - Open means unhealthy; half-open and a poor success rate mean degraded
//! - The success rate is only judged over a minimum sample

pub mod monitor;
pub mod reporter;

pub use monitor::HealthMonitor;
pub use reporter::{HealthReport, HealthReporter, HealthStatus};
