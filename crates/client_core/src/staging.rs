use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use shared::domain::StagedBatch;
use storage::Storage;
use tokio::sync::RwLock;

/// Well-known slot the retrieve flow stages into and the rendering view reads.
pub const STAGING_KEY: &str = "retrievedPasswords";

/// A completed `put` must be visible to any later `get`, including one issued
/// from a different process opening the same backing store.
#[async_trait]
pub trait StagingCache: Send + Sync {
    async fn put(&self, key: &str, value: String) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Removes the slot only if it still holds `expected`; a value written
    /// since it was read survives. Returns whether anything was removed.
    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool>;
}

#[derive(Default)]
pub struct MemoryStagingCache {
    slots: RwLock<HashMap<String, String>>,
}

impl MemoryStagingCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StagingCache for MemoryStagingCache {
    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.slots.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.read().await.get(key).cloned())
    }

    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool> {
        let mut slots = self.slots.write().await;
        if slots.get(key).map(String::as_str) != Some(expected) {
            return Ok(false);
        }
        slots.remove(key);
        Ok(true)
    }
}

#[async_trait]
impl StagingCache for Storage {
    async fn put(&self, key: &str, value: String) -> Result<()> {
        self.put_staging_slot(key, &value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.staging_slot(key).await
    }

    async fn remove_if(&self, key: &str, expected: &str) -> Result<bool> {
        self.remove_staging_slot_if(key, expected).await
    }
}

pub async fn stage_batch(cache: &dyn StagingCache, batch: &StagedBatch) -> Result<()> {
    let encoded = serde_json::to_string(batch).context("failed to encode staged batch")?;
    cache.put(STAGING_KEY, encoded).await
}

/// A decoded batch and the exact slot contents it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRead {
    pub batch: StagedBatch,
    raw: String,
}

/// Reads the staged batch, if any. A slot holding undecodable data is an error,
/// not an absent batch.
pub async fn read_batch(cache: &dyn StagingCache) -> Result<Option<StagedRead>> {
    let Some(raw) = cache.get(STAGING_KEY).await? else {
        return Ok(None);
    };
    let batch = serde_json::from_str(&raw).context("staged batch is not valid JSON")?;
    Ok(Some(StagedRead { batch, raw }))
}

pub async fn load_batch(cache: &dyn StagingCache) -> Result<Option<StagedBatch>> {
    Ok(read_batch(cache).await?.map(|read| read.batch))
}

/// Clears the slot if it still holds exactly what `read` saw.
pub async fn release_batch(cache: &dyn StagingCache, read: &StagedRead) -> Result<bool> {
    cache.remove_if(STAGING_KEY, &read.raw).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::domain::{Credential, CycleId};

    #[tokio::test]
    async fn staged_credential_reads_back_unchanged() {
        let cache = MemoryStagingCache::new();
        let batch = StagedBatch::new(
            CycleId::new(),
            vec![Credential::new("example.com", "alice", "p@ss")],
        );
        stage_batch(&cache, &batch).await.expect("stage");

        let loaded = load_batch(&cache).await.expect("load").expect("present");
        assert_eq!(loaded.credentials[0].website, "example.com");
        assert_eq!(loaded.credentials[0].username, "alice");
        assert_eq!(loaded.credentials[0].password, "p@ss");
        assert_eq!(loaded.cycle_id, batch.cycle_id);
    }

    #[tokio::test]
    async fn missing_slot_loads_as_none() {
        let cache = MemoryStagingCache::new();
        assert!(load_batch(&cache).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn corrupt_slot_is_an_error() {
        let cache = MemoryStagingCache::new();
        cache
            .put(STAGING_KEY, "{truncated".to_string())
            .await
            .expect("put");
        assert!(load_batch(&cache).await.is_err());
    }

    #[tokio::test]
    async fn sqlite_storage_backs_the_staging_slot() {
        let storage = Storage::new("sqlite::memory:").await.expect("db");
        let batch = StagedBatch::new(
            CycleId::new(),
            vec![Credential::new("example.com", "alice", "p@ss")],
        );
        stage_batch(&storage, &batch).await.expect("stage");
        let read = read_batch(&storage).await.expect("load").expect("present");
        assert_eq!(read.batch, batch);

        assert!(release_batch(&storage, &read).await.expect("release"));
        assert!(load_batch(&storage).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn release_leaves_a_newer_batch_in_place() {
        let cache = MemoryStagingCache::new();
        let first = StagedBatch::new(CycleId::new(), Vec::new());
        let second = StagedBatch::new(CycleId::new(), Vec::new());
        stage_batch(&cache, &first).await.expect("stage");
        let read = read_batch(&cache).await.expect("load").expect("present");

        stage_batch(&cache, &second).await.expect("restage");
        assert!(!release_batch(&cache, &read).await.expect("release"));
        assert_eq!(load_batch(&cache).await.expect("load"), Some(second));
    }
}
