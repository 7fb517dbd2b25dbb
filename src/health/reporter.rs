//! Breaker health classification.
//!
//! # Rules
//! ```text
//! Open                                          → unhealthy
//! HalfOpen                                      → degraded
//! Closed, total >= min_samples, rate < minimum  → degraded
//! otherwise                                     → healthy
//! ```

use serde::Serialize;
use std::fmt;

use crate::config::HealthConfig;
use crate::resilience::circuit_breaker::BreakerMetricsView;
use crate::resilience::state::CircuitState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }

    /// Gauge encoding: 0 healthy, 1 degraded, 2 unhealthy.
    pub fn as_gauge(&self) -> f64 {
        match self {
            HealthStatus::Healthy => 0.0,
            HealthStatus::Degraded => 1.0,
            HealthStatus::Unhealthy => 2.0,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monitoring-facing health summary of one breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
}

/// Derives a [`HealthReport`] from breaker metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthReporter {
    /// Requests needed before the success rate is judged.
    pub min_samples: u64,
    /// Closed breakers below this success rate are degraded.
    pub degraded_success_rate: f64,
}

impl Default for HealthReporter {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for HealthReporter {
    fn from(config: &HealthConfig) -> Self {
        Self {
            min_samples: config.min_samples,
            degraded_success_rate: config.degraded_success_rate,
        }
    }
}

impl HealthReporter {
    pub fn health_of(&self, metrics: &BreakerMetricsView) -> HealthReport {
        match metrics.state {
            CircuitState::Open => HealthReport {
                status: HealthStatus::Unhealthy,
                message: format!(
                    "circuit open after {} consecutive failures; calls are failing fast",
                    metrics.consecutive_failures
                ),
            },
            CircuitState::HalfOpen => HealthReport {
                status: HealthStatus::Degraded,
                message: "circuit half-open; probing dependency for recovery".to_string(),
            },
            CircuitState::Closed
                if metrics.total_requests >= self.min_samples
                    && metrics.success_rate < self.degraded_success_rate =>
            {
                HealthReport {
                    status: HealthStatus::Degraded,
                    message: format!(
                        "success rate {:.1}% below {:.1}% over {} requests",
                        metrics.success_rate * 100.0,
                        self.degraded_success_rate * 100.0,
                        metrics.total_requests
                    ),
                }
            }
            CircuitState::Closed => HealthReport {
                status: HealthStatus::Healthy,
                message: format!(
                    "circuit closed; success rate {:.1}% over {} requests",
                    metrics.success_rate * 100.0,
                    metrics.total_requests
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::state::BreakerCore;

    fn view(state: CircuitState, successes: u64, failures: u64) -> BreakerMetricsView {
        let mut core = BreakerCore::new(0);
        core.state = state;
        core.metrics.total_requests = successes + failures;
        core.metrics.successful_requests = successes;
        core.metrics.failed_requests = failures;
        BreakerMetricsView::from_core("dep", &core)
    }

    #[test]
    fn test_open_is_unhealthy() {
        let report = HealthReporter::default().health_of(&view(CircuitState::Open, 0, 5));
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn test_half_open_is_degraded() {
        let report = HealthReporter::default().health_of(&view(CircuitState::HalfOpen, 0, 5));
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[test]
    fn test_low_success_rate_needs_minimum_sample() {
        let reporter = HealthReporter::default();

        // 8/9 is below 95% but under the 10-request minimum.
        let report = reporter.health_of(&view(CircuitState::Closed, 8, 1));
        assert_eq!(report.status, HealthStatus::Healthy);

        let report = reporter.health_of(&view(CircuitState::Closed, 9, 1));
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.message.contains("90.0%"));
    }

    #[test]
    fn test_closed_and_healthy() {
        let report = HealthReporter::default().health_of(&view(CircuitState::Closed, 19, 1));
        assert_eq!(report.status, HealthStatus::Healthy);
    }
}
