//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the breaker
//! runtime. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::circuit_breaker::BreakerConfig;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct BreakerSettings {
    /// Tuning applied to every breaker without an override.
    pub defaults: BreakerTuning,

    /// Per-dependency overrides, keyed by breaker name.
    pub breakers: Vec<BreakerOverride>,

    /// Shared state store settings.
    pub store: StoreConfig,

    /// Health reporting thresholds.
    pub health: HealthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl BreakerSettings {
    /// Effective tuning for `name`: defaults with any matching override applied.
    pub fn tuning_for(&self, name: &str) -> BreakerTuning {
        let mut tuning = self.defaults.clone();
        if let Some(o) = self.breakers.iter().find(|o| o.name == name) {
            if let Some(v) = o.failure_threshold {
                tuning.failure_threshold = v;
            }
            if let Some(v) = o.recovery_timeout_ms {
                tuning.recovery_timeout_ms = v;
            }
            if let Some(v) = o.success_threshold {
                tuning.success_threshold = v;
            }
            if let Some(v) = o.call_timeout_ms {
                tuning.call_timeout_ms = v;
            }
        }
        tuning
    }

    /// Breaker configuration for `name` with the default failure classifier.
    pub fn config_for(&self, name: &str) -> BreakerConfig {
        BreakerConfig::new(name).with_tuning(&self.tuning_for(name))
    }
}

/// Thresholds and timeouts of one breaker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BreakerTuning {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Time the circuit stays open before a half-open probe, in milliseconds.
    pub recovery_timeout_ms: u64,

    /// Half-open successes needed to close the circuit.
    pub success_threshold: u32,

    /// Deadline for each protected call, in milliseconds.
    pub call_timeout_ms: u64,
}

impl BreakerTuning {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl Default for BreakerTuning {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            success_threshold: 1,
            call_timeout_ms: 10_000,
        }
    }
}

/// Per-breaker override. Unset fields fall back to `[defaults]`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BreakerOverride {
    /// Dependency name this override applies to.
    pub name: String,

    #[serde(default)]
    pub failure_threshold: Option<u32>,

    #[serde(default)]
    pub recovery_timeout_ms: Option<u64>,

    #[serde(default)]
    pub success_threshold: Option<u32>,

    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

/// Which state store backend to use.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
}

/// State store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Directory for the file backend.
    pub path: String,

    /// Idle TTL of persisted snapshots in seconds.
    pub ttl_secs: u64,

    /// Upper bound on a single load or save, in milliseconds.
    pub timeout_ms: u64,
}

impl StoreConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: "./breaker-state".to_string(),
            ttl_secs: 3600,
            timeout_ms: 250,
        }
    }
}

/// Health reporting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Requests needed before the success rate is judged.
    pub min_samples: u64,

    /// Closed breakers below this success rate report degraded.
    pub degraded_success_rate: f64,

    /// Health monitor evaluation interval in seconds.
    pub interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            degraded_success_rate: 0.95,
            interval_secs: 15,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let settings: BreakerSettings = toml::from_str("").unwrap();
        assert_eq!(settings, BreakerSettings::default());
        assert_eq!(settings.store.ttl(), Duration::from_secs(3600));
        assert_eq!(settings.health.min_samples, 10);
    }

    #[test]
    fn test_override_merges_with_defaults() {
        let settings: BreakerSettings = toml::from_str(
            r#"
            [defaults]
            failure_threshold = 4
            call_timeout_ms = 800

            [[breakers]]
            name = "ads-api"
            failure_threshold = 2
            recovery_timeout_ms = 200
            "#,
        )
        .unwrap();

        let ads = settings.tuning_for("ads-api");
        assert_eq!(ads.failure_threshold, 2);
        assert_eq!(ads.recovery_timeout(), Duration::from_millis(200));
        assert_eq!(ads.call_timeout(), Duration::from_millis(800));

        let other = settings.tuning_for("llm");
        assert_eq!(other.failure_threshold, 4);
        assert_eq!(other.recovery_timeout_ms, 30_000);
    }

    #[test]
    fn test_store_backend_parses() {
        let settings: BreakerSettings = toml::from_str(
            r#"
            [store]
            backend = "file"
            path = "/tmp/breakers"
            "#,
        )
        .unwrap();
        assert_eq!(settings.store.backend, StoreBackend::File);
        assert_eq!(settings.store.timeout_ms, 250);
    }
}
