//! # Durable State Store
//!
//! Local persistence used purely for crash recovery of an actor's own state. Every actor
//! reads and writes a single key (the `Display` form of its entity id), so two actors
//! never touch each other's snapshot even when they share one store instance.
//!
//! Snapshots are JSON [`Snapshot`] envelopes holding the entity state plus the records
//! that had not been committed downstream when the snapshot was taken.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// Current envelope layout.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted form of one actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<S, R> {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub state: S,
    /// Records not yet committed to the sink, oldest first.
    #[serde(default = "Vec::new")]
    pub pending: Vec<R>,
}

#[derive(Serialize)]
struct SnapshotRef<'a, S, R> {
    version: u32,
    saved_at: DateTime<Utc>,
    state: &'a S,
    pending: &'a [R],
}

/// Serializes a snapshot without cloning the state.
pub fn encode_snapshot<S: Serialize, R: Serialize>(
    state: &S,
    pending: &[R],
) -> Result<Vec<u8>, StoreError> {
    let envelope = SnapshotRef {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        state,
        pending,
    };
    Ok(serde_json::to_vec(&envelope)?)
}

pub fn decode_snapshot<S: DeserializeOwned, R: DeserializeOwned>(
    bytes: &[u8],
) -> Result<Snapshot<S, R>, StoreError> {
    let snapshot: Snapshot<S, R> = serde_json::from_slice(bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(StoreError::UnsupportedVersion(snapshot.version));
    }
    Ok(snapshot)
}

/// Storage backend for snapshots.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Returns `Ok(None)` when nothing was ever saved under `key`.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replaces the value under `key`.
    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral deployments.
///
/// Supports fault injection so tests can observe the persistence-warning path.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    failing: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every `save` fails with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// Drops a snapshot, simulating lost local storage.
    pub async fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().await.remove(key)
    }

    pub async fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.entries.lock().await.insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("injected failure saving {key}")));
        }
        self.entries.lock().await.insert(key.to_string(), bytes);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One JSON file per key under a directory, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Opens (and creates if needed) the snapshot directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for `key`. Bytes outside `[A-Za-z0-9_-]` are percent-encoded so that
    /// distinct keys never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(byte as char);
            } else {
                name.push_str(&format!("%{byte:02x}"));
            }
        }
        name.push_str(".json");
        self.dir.join(name)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let dir = self.dir.clone();
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut file = tempfile::NamedTempFile::new_in(&dir)?;
            file.write_all(&bytes)?;
            file.as_file().sync_all()?;
            file.persist(&path).map_err(|e| StoreError::Io(e.error))?;
            debug!(path = %path.display(), "Snapshot written");
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Tally {
        total: u64,
    }

    #[test]
    fn test_snapshot_envelope_keeps_pending_records() {
        let bytes = encode_snapshot(&Tally { total: 3 }, &["a".to_string(), "b".to_string()]).unwrap();
        let snapshot: Snapshot<Tally, String> = decode_snapshot(&bytes).unwrap();

        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.state, Tally { total: 3 });
        assert_eq!(snapshot.pending, vec!["a", "b"]);
    }

    #[test]
    fn test_snapshot_without_pending_field_decodes() {
        let json = br#"{"version":1,"saved_at":"2026-01-01T00:00:00Z","state":{"total":9}}"#;
        let snapshot: Snapshot<Tally, String> = decode_snapshot(json).unwrap();
        assert_eq!(snapshot.state.total, 9);
        assert!(snapshot.pending.is_empty());
    }

    #[test]
    fn test_unknown_snapshot_version_is_rejected() {
        let json = br#"{"version":7,"saved_at":"2026-01-01T00:00:00Z","state":{"total":9}}"#;
        let result = decode_snapshot::<Tally, String>(json);
        assert!(matches!(result, Err(StoreError::UnsupportedVersion(7))));
    }

    #[tokio::test]
    async fn test_memory_store_injected_failure() {
        let store = MemoryStateStore::new();
        store.set_failing(true);
        assert!(store.save("k", vec![1]).await.is_err());
        assert_eq!(store.load("k").await.unwrap(), None);

        store.set_failing(false);
        store.save("k", vec![1]).await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), Some(vec![1]));
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_file_store_roundtrip_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(dir.path().join("snapshots")).unwrap();

        assert_eq!(store.load("article:42").await.unwrap(), None);
        store.save("article:42", b"first".to_vec()).await.unwrap();
        store.save("article:42", b"second".to_vec()).await.unwrap();
        assert_eq!(store.load("article:42").await.unwrap(), Some(b"second".to_vec()));
    }

    #[test]
    fn test_file_store_keys_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).unwrap();

        assert_ne!(store.path_for("article:1"), store.path_for("article_1"));
        assert!(store
            .path_for("article:1")
            .ends_with("article%3a1.json"));
    }
}
