use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::service::ManagedService;
use crate::traits::KeyValueStore;

/// In-process [`KeyValueStore`]. Contents do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ManagedService for MemoryStore {
    async fn shutdown(&self, terminate: bool) -> anyhow::Result<()> {
        debug!(entries = self.entries.len(), terminate, "discarding memory store");
        self.entries.clear();
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, key: &str, value: String) -> anyhow::Result<()> {
        self.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn keys(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let store = MemoryStore::new();
        store.put("a", "1".into()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keys_filter_by_prefix_and_sort() {
        let store = MemoryStore::new();
        for key in ["audit:2", "audit:1", "config:x"] {
            store.put(key, String::new()).await.unwrap();
        }
        assert_eq!(store.keys("audit:").await.unwrap(), vec!["audit:1", "audit:2"]);
    }

    #[tokio::test]
    async fn shutdown_clears_entries() {
        let store = MemoryStore::new();
        store.put("a", "1".into()).await.unwrap();
        store.shutdown(false).await.unwrap();
        assert!(store.is_empty());
    }
}
