//! Scoped key/value persistence for user and conversation state
//!
//! Values are stored as JSON blobs under `(entity kind, entity id, property)`.
//! A turn loads what it needs up front and writes back only what changed,
//! in a single `commit` so persistence is all-or-nothing.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("State store unavailable: {0}")]
    Unavailable(String),
}

pub type StateResult<T> = Result<T, StateError>;

/// Kind of entity a property belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Conversation,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Conversation => "conversation",
        }
    }
}

/// Address of one stored blob
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub kind: EntityKind,
    pub entity_id: String,
    pub property: String,
}

impl ScopeKey {
    #[must_use]
    pub fn new(kind: EntityKind, entity_id: impl Into<String>, property: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            property: property.into(),
        }
    }

    #[must_use]
    pub fn user(user_id: impl Into<String>, property: impl Into<String>) -> Self {
        Self::new(EntityKind::User, user_id, property)
    }

    #[must_use]
    pub fn conversation(conversation_id: impl Into<String>, property: impl Into<String>) -> Self {
        Self::new(EntityKind::Conversation, conversation_id, property)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind.as_str(), self.entity_id, self.property)
    }
}

/// One pending write; `None` deletes the key
#[derive(Debug, Clone, PartialEq)]
pub struct StateWrite {
    pub key: ScopeKey,
    pub value: Option<Value>,
}

impl StateWrite {
    #[must_use]
    pub fn save(key: ScopeKey, value: Value) -> Self {
        Self {
            key,
            value: Some(value),
        }
    }

    #[must_use]
    pub fn delete(key: ScopeKey) -> Self {
        Self { key, value: None }
    }
}

/// Persistence backend for scoped state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load a blob; `Ok(None)` when the key has never been written
    async fn load(&self, key: &ScopeKey) -> StateResult<Option<Value>>;

    async fn save(&self, key: &ScopeKey, value: &Value) -> StateResult<()>;

    async fn delete(&self, key: &ScopeKey) -> StateResult<()>;

    /// Apply a batch of writes. Backends that can should make this atomic.
    async fn commit(&self, writes: &[StateWrite]) -> StateResult<()> {
        for write in writes {
            match &write.value {
                Some(value) => self.save(&write.key, value).await?,
                None => self.delete(&write.key).await?,
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn load(&self, key: &ScopeKey) -> StateResult<Option<Value>> {
        (**self).load(key).await
    }

    async fn save(&self, key: &ScopeKey, value: &Value) -> StateResult<()> {
        (**self).save(key, value).await
    }

    async fn delete(&self, key: &ScopeKey) -> StateResult<()> {
        (**self).delete(key).await
    }

    async fn commit(&self, writes: &[StateWrite]) -> StateResult<()> {
        (**self).commit(writes).await
    }
}

// ============================================================================
// Property Bag
// ============================================================================

/// Turn-local cache of one entity's properties with dirty tracking
#[derive(Debug, Clone)]
pub struct PropertyBag {
    kind: EntityKind,
    entity_id: String,
    values: HashMap<String, Value>,
    dirty: BTreeSet<String>,
}

impl PropertyBag {
    #[must_use]
    pub fn new(kind: EntityKind, entity_id: impl Into<String>) -> Self {
        Self {
            kind,
            entity_id: entity_id.into(),
            values: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Load the named properties from the store
    ///
    /// # Errors
    ///
    /// Store failures, including blobs the store cannot decode.
    pub async fn load<S: StateStore + ?Sized>(
        store: &S,
        kind: EntityKind,
        entity_id: &str,
        properties: impl IntoIterator<Item = &str>,
    ) -> StateResult<Self> {
        let mut bag = Self::new(kind, entity_id);
        for property in properties {
            let key = ScopeKey::new(kind, entity_id, property);
            if let Some(value) = store.load(&key).await? {
                bag.values.insert(property.to_string(), value);
            }
        }
        Ok(bag)
    }

    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    #[must_use]
    pub fn get_raw(&self, property: &str) -> Option<&Value> {
        self.values.get(property)
    }

    /// Typed read; `Ok(None)` when the property is absent
    ///
    /// # Errors
    ///
    /// `Serialization` when the stored value does not decode into `T`.
    pub fn get<T: DeserializeOwned>(&self, property: &str) -> StateResult<Option<T>> {
        self.values
            .get(property)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(StateError::from)
    }

    /// Typed read falling back to `T::default()`
    ///
    /// # Errors
    ///
    /// `Serialization` when the stored value does not decode into `T`.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, property: &str) -> StateResult<T> {
        Ok(self.get(property)?.unwrap_or_default())
    }

    /// Stage a value; it is written back at the end of the turn
    ///
    /// # Errors
    ///
    /// `Serialization` when `value` cannot be encoded.
    pub fn set<T: Serialize>(&mut self, property: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_value(value)?;
        if self.values.get(property) != Some(&value) {
            self.values.insert(property.to_string(), value);
            self.dirty.insert(property.to_string());
        }
        Ok(())
    }

    pub fn remove(&mut self, property: &str) {
        if self.values.remove(property).is_some() {
            self.dirty.insert(property.to_string());
        }
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Writes for every property changed since load
    #[must_use]
    pub fn pending_writes(&self) -> Vec<StateWrite> {
        self.dirty
            .iter()
            .map(|property| {
                let key = ScopeKey::new(self.kind, self.entity_id.clone(), property.clone());
                match self.values.get(property) {
                    Some(value) => StateWrite::save(key, value.clone()),
                    None => StateWrite::delete(key),
                }
            })
            .collect()
    }
}
