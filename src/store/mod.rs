//! Shared breaker state store.
//!
//! # Data Flow
//! ```text
//! CircuitBreaker::call
//!     → load(name)              (start of call, merge into local state)
//!     → save(name, snapshot)    (end of call, idle TTL refreshed)
//! ```
//!
//! # Design Decisions
//! - The store is shared by every process using the same backend; the entry
//!   keyed by breaker name is the cross-process identity
//! - Last writer wins, no transactions across calls
//! - `StoreError::Unavailable` is an expected outcome: the breaker keeps
//!   working from memory and logs a warning
//! - Backends: in-memory (single process, tests) and file-per-key (several
//!   processes on one host)

pub mod file;
pub mod memory;
pub mod snapshot;

use async_trait::async_trait;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};
use crate::resilience::clock::Clock;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use snapshot::StateSnapshot;

/// Errors surfaced by a state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or did not answer in time.
    #[error("state store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded.
    #[error("corrupt value under '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

impl StoreError {
    pub fn unavailable(reason: impl Display) -> Self {
        StoreError::Unavailable(reason.to_string())
    }

    pub fn corrupt(key: impl Into<String>, reason: impl Display) -> Self {
        StoreError::Corrupt {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Key-value store holding one snapshot per breaker name.
#[async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Latest snapshot for `name`, or `None` if absent or expired.
    async fn load(&self, name: &str) -> Result<Option<StateSnapshot>, StoreError>;

    /// Write the snapshot, expiring it after `ttl` without further writes.
    async fn save(&self, name: &str, snapshot: &StateSnapshot, ttl: Duration)
        -> Result<(), StoreError>;

    /// Delete the snapshot for `name`.
    async fn remove(&self, name: &str) -> Result<(), StoreError>;

    /// Names of all breakers with a live snapshot.
    async fn names(&self) -> Result<Vec<String>, StoreError>;
}

/// Build the store selected by configuration.
pub fn open_store(config: &StoreConfig, clock: Arc<dyn Clock>) -> Arc<dyn StateStore> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory breaker state store");
            Arc::new(MemoryStore::with_clock(clock))
        }
        StoreBackend::File => {
            tracing::info!(path = %config.path, "Using file breaker state store");
            Arc::new(FileStore::with_clock(&config.path, clock))
        }
    }
}
