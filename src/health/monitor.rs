//! Periodic breaker health evaluation.
//!
//! # Responsibilities
//! - Refresh each registered breaker from the shared store
//! - Export a health gauge per breaker
//! - Log status changes

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::health::{HealthReport, HealthStatus};
use crate::observability::metrics;
use crate::resilience::registry::BreakerRegistry;

pub struct HealthMonitor {
    registry: Arc<BreakerRegistry>,
    interval: Duration,
    last: HashMap<String, HealthStatus>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<BreakerRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            last: HashMap::new(),
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Evaluate every breaker once. Returns the reports by name.
    pub async fn check_all(&mut self) -> Vec<(String, HealthReport)> {
        let mut reports = Vec::new();

        for breaker in self.registry.all() {
            breaker.refresh().await;
            let report = breaker.health();
            let name = breaker.name().to_string();
            metrics::record_health(&name, report.status);

            let previous = self.last.insert(name.clone(), report.status);
            if previous != Some(report.status) {
                match report.status {
                    HealthStatus::Healthy if previous.is_some() => tracing::info!(
                        breaker = %name,
                        message = %report.message,
                        "Dependency healthy again"
                    ),
                    HealthStatus::Healthy => {}
                    status => tracing::warn!(
                        breaker = %name,
                        status = %status,
                        message = %report.message,
                        "Dependency health changed"
                    ),
                }
            }
            reports.push((name, report));
        }

        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BreakerSettings;
    use crate::lifecycle::Shutdown;
    use crate::resilience::circuit_breaker::BreakerConfig;
    use crate::store::MemoryStore;

    #[derive(Debug, thiserror::Error)]
    #[error("down")]
    struct Down;

    #[tokio::test]
    async fn test_check_all_reports_each_breaker() {
        let registry = Arc::new(BreakerRegistry::new(
            Arc::new(MemoryStore::new()),
            BreakerSettings::default(),
        ));
        let failing = registry.get_or_create("crm", BreakerConfig::new("crm").with_failure_threshold(1));
        registry.breaker("ads-api");
        let _ = failing.call(|| async { Err::<(), _>(Down) }).await;

        let mut monitor = HealthMonitor::new(registry, Duration::from_secs(60));
        let reports = monitor.check_all().await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].0, "ads-api");
        assert_eq!(reports[0].1.status, HealthStatus::Healthy);
        assert_eq!(reports[1].0, "crm");
        assert_eq!(reports[1].1.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let registry = Arc::new(BreakerRegistry::new(
            Arc::new(MemoryStore::new()),
            BreakerSettings::default(),
        ));
        let shutdown = Shutdown::new();
        let monitor = HealthMonitor::new(registry, Duration::from_millis(10));
        let task = tokio::spawn(monitor.run(shutdown.subscribe()));

        time::sleep(Duration::from_millis(30)).await;
        shutdown.trigger();
        time::timeout(Duration::from_secs(1), task)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
