//! Persisted breaker snapshot and its key layout.
//!
//! # Layout
//! ```text
//! breaker:{name}:state   → { state, last_transition_at, half_open_successes }
//! breaker:{name}:metrics → { counters..., recent_transitions[<=10] }
//! ```
//! Both keys are written together with the same idle TTL. A missing state key
//! means the breaker has expired; a missing metrics key alone is read as zeroed
//! counters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resilience::counters::{BreakerMetrics, MAX_RECENT_TRANSITIONS};
use crate::resilience::state::{BreakerCore, CircuitState};
use crate::store::StoreError;

const KEY_PREFIX: &str = "breaker:";
const STATE_SUFFIX: &str = ":state";
const METRICS_SUFFIX: &str = ":metrics";

pub fn state_key(name: &str) -> String {
    format!("{KEY_PREFIX}{name}{STATE_SUFFIX}")
}

pub fn metrics_key(name: &str) -> String {
    format!("{KEY_PREFIX}{name}{METRICS_SUFFIX}")
}

/// Breaker name for a `breaker:{name}:state` key.
pub fn name_from_state_key(key: &str) -> Option<&str> {
    key.strip_prefix(KEY_PREFIX)?.strip_suffix(STATE_SUFFIX)
}

/// State half of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    pub state: CircuitState,
    pub last_transition_at: u64,
    #[serde(default)]
    pub half_open_successes: u32,
}

/// Serializable projection of a breaker's state and metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub state: StateRecord,
    pub metrics: BreakerMetrics,
}

impl StateSnapshot {
    pub fn from_core(core: &BreakerCore) -> Self {
        Self {
            state: StateRecord {
                state: core.state,
                last_transition_at: core.last_transition_at,
                half_open_successes: core.half_open_successes,
            },
            metrics: core.metrics.clone(),
        }
    }

    pub fn into_core(self) -> BreakerCore {
        BreakerCore {
            state: self.state.state,
            last_transition_at: self.state.last_transition_at,
            half_open_successes: self.state.half_open_successes,
            metrics: self.metrics,
        }
    }

    /// Encode into `(state, metrics)` JSON values.
    pub fn encode(&self, name: &str) -> Result<(Value, Value), StoreError> {
        let state = serde_json::to_value(&self.state)
            .map_err(|e| StoreError::corrupt(state_key(name), e))?;
        let metrics = serde_json::to_value(&self.metrics)
            .map_err(|e| StoreError::corrupt(metrics_key(name), e))?;
        Ok((state, metrics))
    }

    /// Decode from the two stored values. `Ok(None)` when the state key is absent.
    pub fn decode(
        name: &str,
        state: Option<Value>,
        metrics: Option<Value>,
    ) -> Result<Option<Self>, StoreError> {
        let Some(state) = state else {
            return Ok(None);
        };
        let state: StateRecord = serde_json::from_value(state)
            .map_err(|e| StoreError::corrupt(state_key(name), e))?;
        let mut metrics: BreakerMetrics = match metrics {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| StoreError::corrupt(metrics_key(name), e))?,
            None => BreakerMetrics::default(),
        };

        // Another writer may keep a longer history than we do.
        while metrics.recent_transitions.len() > MAX_RECENT_TRANSITIONS {
            metrics.recent_transitions.pop_front();
        }

        Ok(Some(Self { state, metrics }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::BreakerConfig;

    #[test]
    fn test_key_layout() {
        assert_eq!(state_key("ads-api"), "breaker:ads-api:state");
        assert_eq!(metrics_key("ads-api"), "breaker:ads-api:metrics");
        assert_eq!(name_from_state_key("breaker:ads-api:state"), Some("ads-api"));
        assert_eq!(name_from_state_key("breaker:ads-api:metrics"), None);
    }

    #[test]
    fn test_snapshot_survives_encoding() {
        let config = BreakerConfig::new("ads-api").with_failure_threshold(1);
        let mut core = BreakerCore::new(100);
        core.on_success(110, &config);
        core.on_failure(120, &config);

        let snapshot = StateSnapshot::from_core(&core);
        let (state, metrics) = snapshot.encode("ads-api").unwrap();
        assert_eq!(state["state"], "open");

        let decoded = StateSnapshot::decode("ads-api", Some(state), Some(metrics))
            .unwrap()
            .unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.into_core(), core);
    }

    #[test]
    fn test_missing_state_is_expired() {
        let decoded = StateSnapshot::decode("x", None, Some(serde_json::json!({}))).unwrap();
        assert!(decoded.is_none());
    }

    #[test]
    fn test_corrupt_state_is_reported() {
        let err = StateSnapshot::decode("x", Some(serde_json::json!({"state": "melted"})), None)
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref key, .. } if key == "breaker:x:state"));
    }
}
