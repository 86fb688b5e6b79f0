//! Persistence for governance state
//!
//! The durable layout is a single JSON document holding the proposal table,
//! the treasury (balance scalar plus held assets) and any unfinished exits.
//! One document per write keeps proposals and treasury from tearing apart.
//! Membership is owned by the external registry and is never persisted here.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::treasury::Treasury;
use crate::types::{Address, Proposal};

/// Key of the ledger document
pub const LEDGER_KEY: &str = "governance/ledger";

/// Storage-related errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Corrupt ledger state: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value byte store
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Store data at the specified key
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Retrieve data from the specified key
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let mut storage = self.data.write().await;
        storage.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let storage = self.data.read().await;
        storage
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.read().await.contains_key(key))
    }
}

/// File-backed store, one file per key under a base directory
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `base_path`, creating the directory if needed
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    fn get_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        for part in key.split('/') {
            path.push(part);
        }
        path.set_extension("json");
        path
    }
}

#[async_trait]
impl LedgerStore for FileStore {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.get_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write next to the target, then rename over it
        let tmp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(&tmp_path, &path).await?;

        trace!("Stored {} bytes at {}", data.len(), path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.get_path(key);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::KeyNotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(fs::try_exists(self.get_path(key)).await?)
    }
}

/// Everything the core persists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub proposals: Vec<Proposal>,
    pub treasury: Treasury,
    /// Holders paid out whose tokens are not yet burned
    #[serde(default)]
    pub pending_exits: BTreeSet<Address>,
}

/// Write a snapshot as one document
pub async fn save_snapshot(store: &dyn LedgerStore, snapshot: &LedgerSnapshot) -> StorageResult<()> {
    let document = serde_json::to_vec_pretty(snapshot)?;
    store.put(LEDGER_KEY, &document).await?;

    debug!(
        "Persisted {} proposals and treasury balance {}",
        snapshot.proposals.len(),
        snapshot.treasury.balance()
    );
    Ok(())
}

/// Read a snapshot, `None` if nothing was ever persisted
pub async fn load_snapshot(store: &dyn LedgerStore) -> StorageResult<Option<LedgerSnapshot>> {
    if !store.exists(LEDGER_KEY).await? {
        return Ok(None);
    }

    let snapshot = serde_json::from_slice(&store.get(LEDGER_KEY).await?)?;
    Ok(Some(snapshot))
}
