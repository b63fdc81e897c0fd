//! In-memory state store

use super::{ScopeKey, StateResult, StateStore, StateWrite};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Volatile store backed by a map; commits happen under a single write lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<ScopeKey, Value>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, key: &ScopeKey) -> StateResult<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &ScopeKey, value: &Value) -> StateResult<()> {
        self.entries.write().await.insert(key.clone(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &ScopeKey) -> StateResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn commit(&self, writes: &[StateWrite]) -> StateResult<()> {
        let mut entries = self.entries.write().await;
        for write in writes {
            match &write.value {
                Some(value) => {
                    entries.insert(write.key.clone(), value.clone());
                }
                None => {
                    entries.remove(&write.key);
                }
            }
        }
        Ok(())
    }
}
