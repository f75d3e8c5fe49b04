//! The `Storage` trait and the in-memory backend.
//!
//! A backend is an ordered key-value map. The engine owns all index
//! semantics; backends only store, fetch, and range-scan opaque JSON
//! records under structured keys.

use std::{
  collections::BTreeMap,
  future::Future,
  ops::Bound,
  sync::{Arc, Mutex},
};

use serde_json::Value as JsonValue;

use crate::{
  Error, Result,
  key::{Key, Prefix},
};

/// Ordered key-value storage underneath a fact store.
///
/// All methods return `Send` futures so implementations can be shared
/// across tokio worker threads.
pub trait Storage: Send + Sync {
  fn get(
    &self,
    key: &Key,
  ) -> impl Future<Output = Result<Option<JsonValue>>> + Send;

  fn put(
    &self,
    key: Key,
    value: JsonValue,
  ) -> impl Future<Output = Result<()>> + Send;

  fn delete(&self, key: &Key) -> impl Future<Output = Result<()>> + Send;

  /// Every entry whose key begins with `prefix`, in key order.
  fn list_prefix(
    &self,
    prefix: &Prefix,
  ) -> impl Future<Output = Result<Vec<(Key, JsonValue)>>> + Send;
}

// ─── In-memory backend ───────────────────────────────────────────────────────

/// The in-memory backend: the client replica's mirrored index, and the test
/// substrate for the engine. Cloning shares the underlying map; use
/// [`MemoryStorage::snapshot`] for an independent copy.
#[derive(Clone, Default)]
pub struct MemoryStorage {
  entries: Arc<Mutex<BTreeMap<Key, JsonValue>>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// A deep, independent copy. The replica rebases speculative mutations
  /// onto a snapshot of its mirror after every pull.
  pub fn snapshot(&self) -> Result<Self> {
    let entries = self.entries.lock().map_err(|_| Error::Poisoned)?.clone();
    Ok(Self {
      entries: Arc::new(Mutex::new(entries)),
    })
  }

  /// Number of stored entries; test-only observability.
  pub fn len(&self) -> Result<usize> {
    Ok(self.entries.lock().map_err(|_| Error::Poisoned)?.len())
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }
}

impl Storage for MemoryStorage {
  async fn get(&self, key: &Key) -> Result<Option<JsonValue>> {
    let entries = self.entries.lock().map_err(|_| Error::Poisoned)?;
    Ok(entries.get(key).cloned())
  }

  async fn put(&self, key: Key, value: JsonValue) -> Result<()> {
    let mut entries = self.entries.lock().map_err(|_| Error::Poisoned)?;
    entries.insert(key, value);
    Ok(())
  }

  async fn delete(&self, key: &Key) -> Result<()> {
    let mut entries = self.entries.lock().map_err(|_| Error::Poisoned)?;
    entries.remove(key);
    Ok(())
  }

  async fn list_prefix(&self, prefix: &Prefix) -> Result<Vec<(Key, JsonValue)>> {
    let entries = self.entries.lock().map_err(|_| Error::Poisoned)?;
    let start = Key::new(prefix.space, prefix.parts.clone());
    Ok(
      entries
        .range((Bound::Included(start), Bound::Unbounded))
        .take_while(|(key, _)| prefix.matches(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect(),
    )
  }
}
