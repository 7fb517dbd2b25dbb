//! In-process state store.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::resilience::clock::{Clock, SystemClock};
use crate::store::snapshot::{self, StateSnapshot};
use crate::store::{StateStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: u64,
}

/// A TTL-aware store backed by a concurrent map.
///
/// Sharing one instance between several breakers (or registries) behaves like
/// several processes sharing an external store. Availability can be toggled
/// to exercise degraded mode.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    clock: Arc<dyn Clock>,
    available: AtomicBool,
    loads: AtomicU64,
    saves: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            available: AtomicBool::new(true),
            loads: AtomicU64::new(0),
            saves: AtomicU64::new(0),
        }
    }

    /// Simulate the store going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful `load` calls.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries.iter().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("memory store disabled"))
        }
    }

    fn get_live(&self, key: &str, now: u64) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        }
        None
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, name: &str) -> Result<Option<StateSnapshot>, StoreError> {
        self.check_available()?;
        let now = self.clock.now_millis();
        let state = self.get_live(&snapshot::state_key(name), now);
        let metrics = self.get_live(&snapshot::metrics_key(name), now);
        self.loads.fetch_add(1, Ordering::Relaxed);
        StateSnapshot::decode(name, state, metrics)
    }

    async fn save(
        &self,
        name: &str,
        snapshot: &StateSnapshot,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        let (state, metrics) = snapshot.encode(name)?;
        let expires_at = self
            .clock
            .now_millis()
            .saturating_add(ttl.as_millis() as u64);

        self.entries.insert(
            snapshot::state_key(name),
            Entry {
                value: state,
                expires_at,
            },
        );
        self.entries.insert(
            snapshot::metrics_key(name),
            Entry {
                value: metrics,
                expires_at,
            },
        );
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.check_available()?;
        self.entries.remove(&snapshot::state_key(name));
        self.entries.remove(&snapshot::metrics_key(name));
        Ok(())
    }

    async fn names(&self) -> Result<Vec<String>, StoreError> {
        self.check_available()?;
        let now = self.clock.now_millis();
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.expires_at > now)
            .filter_map(|e| snapshot::name_from_state_key(e.key()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }
}
