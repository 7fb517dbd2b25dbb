//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging and the metrics exporter from configuration
//! - Open the configured state store and build an empty registry
//! - Start background tasks (health monitor, config reload)
//!
//! # Design Decisions
//! - Fail fast: configuration errors surface before anything starts
//! - Background tasks subscribe to the shutdown broadcast
//! - A broken metrics address is logged, not fatal; breakers still work

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::watcher::ConfigWatcher;
use crate::config::BreakerSettings;
use crate::health::HealthMonitor;
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::{logging, metrics};
use crate::resilience::clock::SystemClock;
use crate::resilience::registry::BreakerRegistry;
use crate::store::open_store;

/// Install logging and metrics, then build the registry.
pub fn bootstrap(settings: BreakerSettings) -> Arc<BreakerRegistry> {
    logging::init_logging(&settings.observability);

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let clock = Arc::new(SystemClock);
    let store = open_store(&settings.store, clock.clone());

    tracing::info!(
        failure_threshold = settings.defaults.failure_threshold,
        recovery_timeout_ms = settings.defaults.recovery_timeout_ms,
        overrides = settings.breakers.len(),
        "Breaker registry ready"
    );

    Arc::new(BreakerRegistry::with_clock(store, settings, clock))
}

/// Spawn the health monitor and, when a config path is given, the reload
/// loop. The returned watcher must outlive the reload task.
pub fn spawn_background(
    registry: Arc<BreakerRegistry>,
    shutdown: &Shutdown,
    config_path: Option<&Path>,
) -> (Vec<JoinHandle<()>>, Option<notify::RecommendedWatcher>) {
    let mut tasks = Vec::new();

    let interval = Duration::from_secs(registry.settings().health.interval_secs);
    let monitor = HealthMonitor::new(registry.clone(), interval);
    tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));

    let mut watcher = None;
    if let Some(path) = config_path {
        let (config_watcher, mut updates) = ConfigWatcher::new(path);
        match config_watcher.run() {
            Ok(w) => {
                watcher = Some(w);
                let mut stop = shutdown.subscribe();
                tasks.push(tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            Some(settings) = updates.recv() => registry.apply_settings(settings),
                            _ = stop.recv() => break,
                        }
                    }
                }));
            }
            Err(e) => tracing::error!(error = %e, "Config hot reload disabled"),
        }
    }

    (tasks, watcher)
}
