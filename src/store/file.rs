//! File-backed state store.
//!
//! One JSON file per key in a shared directory, so several processes on the
//! same host see each other's breaker transitions. Writes go to a temporary
//! file that is renamed into place; readers never observe a partial value.
//! Expired files are treated as absent and removed lazily.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

use crate::resilience::clock::{Clock, SystemClock};
use crate::store::snapshot::{self, StateSnapshot};
use crate::store::{StateStore, StoreError};

const FILE_EXTENSION: &str = "json";

#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    expires_at: u64,
    value: Value,
}

/// State store keeping each key in its own file under `dir`.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    pub fn with_clock(dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_file_name(key), FILE_EXTENSION))
    }

    async fn read_key(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::unavailable(e)),
        };

        let stored: StoredValue =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::corrupt(key, e))?;
        if stored.expires_at <= self.clock.now_millis() {
            if let Err(e) = fs::remove_file(&path).await {
                tracing::debug!(key, error = %e, "Failed to remove expired state file");
            }
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    async fn write_key(&self, key: &str, value: Value, expires_at: u64) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&StoredValue { expires_at, value })
            .map_err(|e| StoreError::corrupt(key, e))?;

        let tmp = self.dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, &bytes)
            .await
            .map_err(StoreError::unavailable)?;
        if let Err(e) = fs::rename(&tmp, self.path_for(key)).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::unavailable(e));
        }
        Ok(())
    }

    async fn remove_key(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::unavailable(e)),
        }
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn load(&self, name: &str) -> Result<Option<StateSnapshot>, StoreError> {
        let state = self.read_key(&snapshot::state_key(name)).await?;
        let metrics = self.read_key(&snapshot::metrics_key(name)).await?;
        StateSnapshot::decode(name, state, metrics)
    }

    async fn save(
        &self,
        name: &str,
        snapshot: &StateSnapshot,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(StoreError::unavailable)?;

        let (state, metrics) = snapshot.encode(name)?;
        let expires_at = self
            .clock
            .now_millis()
            .saturating_add(ttl.as_millis() as u64);

        // Metrics first: a reader that sees the new state also sees its counters.
        self.write_key(&snapshot::metrics_key(name), metrics, expires_at)
            .await?;
        self.write_key(&snapshot::state_key(name), state, expires_at)
            .await
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.remove_key(&snapshot::state_key(name)).await?;
        self.remove_key(&snapshot::metrics_key(name)).await
    }

    async fn names(&self) -> Result<Vec<String>, StoreError> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::unavailable(e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(StoreError::unavailable)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(decode_file_name)
            else {
                continue;
            };
            let Some(name) = snapshot::name_from_state_key(&key) else {
                continue;
            };
            if self.read_key(&key).await?.is_some() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Percent-encode everything outside `[A-Za-z0-9_-]` so keys are portable file names.
fn encode_file_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn decode_file_name(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;
    use crate::resilience::state::BreakerCore;

    use tempfile::TempDir;

    #[test]
    fn test_file_name_encoding() {
        let key = "breaker:ads api/v2:state";
        let encoded = encode_file_name(key);
        assert!(!encoded.contains(':'));
        assert!(!encoded.contains('/'));
        assert_eq!(decode_file_name(&encoded).as_deref(), Some(key));
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let dir = TempDir::new().unwrap();
        let writer = FileStore::new(dir.path());
        let reader = FileStore::new(dir.path());
        let snapshot = StateSnapshot::from_core(&BreakerCore::new(7));

        writer
            .save("workflow", &snapshot, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(reader.load("workflow").await.unwrap(), Some(snapshot));
        assert_eq!(reader.names().await.unwrap(), vec!["workflow".to_string()]);

        reader.remove("workflow").await.unwrap();
        assert!(writer.load("workflow").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_files_are_absent() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(1_000));
        let store = FileStore::with_clock(dir.path(), clock.clone());
        let snapshot = StateSnapshot::from_core(&BreakerCore::new(1_000));

        store
            .save("broker", &snapshot, Duration::from_millis(500))
            .await
            .unwrap();
        clock.advance(Duration::from_millis(500));

        assert!(store.load("broker").await.unwrap().is_none());
        assert!(store.names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("missing"));
        assert!(store.load("nothing").await.unwrap().is_none());
        assert!(store.names().await.unwrap().is_empty());
    }
}
