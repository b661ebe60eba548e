//! Cache store trait and the in-memory implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

use super::key::QueryKey;

/// A cached query result.
///
/// The value is kept as JSON so a single store can hold every entity type
/// and a snapshot can be restored byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  pub value: Value,
  /// When the value was last written (fetched or optimistically set)
  pub updated_at: DateTime<Utc>,
  /// Set when a mutation has made the value untrustworthy; the next
  /// access refetches.
  pub invalidated: bool,
}

impl CacheEntry {
  pub fn new(value: Value) -> Self {
    Self {
      value,
      updated_at: Utc::now(),
      invalidated: false,
    }
  }

  /// Serialize `data` into a fresh entry.
  pub fn encode<T: Serialize>(data: &T) -> Result<Self> {
    let value =
      serde_json::to_value(data).map_err(|e| eyre!("Failed to serialize cache value: {}", e))?;
    Ok(Self::new(value))
  }

  /// Deserialize the cached value.
  pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
    serde_json::from_value(self.value.clone())
      .map_err(|e| eyre!("Failed to deserialize cache value: {}", e))
  }
}

/// Process-wide key/value store for query results.
///
/// Injected as `Arc<dyn CacheStore>` so tests can swap the backend. No
/// persistence guarantee is implied by the trait itself.
pub trait CacheStore: Send + Sync {
  /// Look up the entry for an exact key.
  fn get(&self, key: &QueryKey) -> Result<Option<CacheEntry>>;

  /// Write a single entry, replacing any previous one.
  fn set(&self, key: &QueryKey, entry: CacheEntry) -> Result<()> {
    self.set_many(vec![(key.clone(), entry)])
  }

  /// Write several entries atomically: either all are visible or none.
  fn set_many(&self, entries: Vec<(QueryKey, CacheEntry)>) -> Result<()>;

  /// Mark an entry stale. Returns false when there was nothing cached.
  fn invalidate(&self, key: &QueryKey) -> Result<bool>;

  /// Drop an entry entirely.
  fn remove(&self, key: &QueryKey) -> Result<()>;

  /// All cached keys addressed by `prefix`, in key order.
  fn keys_with_prefix(&self, prefix: &QueryKey) -> Result<Vec<QueryKey>>;
}

/// In-memory store, the default backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: RwLock<BTreeMap<QueryKey, CacheEntry>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStore for MemoryStore {
  fn get(&self, key: &QueryKey) -> Result<Option<CacheEntry>> {
    let entries = self
      .entries
      .read()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).cloned())
  }

  fn set_many(&self, batch: Vec<(QueryKey, CacheEntry)>) -> Result<()> {
    let mut entries = self
      .entries
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.extend(batch);
    Ok(())
  }

  fn invalidate(&self, key: &QueryKey) -> Result<bool> {
    let mut entries = self
      .entries
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    match entries.get_mut(key) {
      Some(entry) => {
        entry.invalidated = true;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  fn remove(&self, key: &QueryKey) -> Result<()> {
    let mut entries = self
      .entries
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.remove(key);
    Ok(())
  }

  fn keys_with_prefix(&self, prefix: &QueryKey) -> Result<Vec<QueryKey>> {
    let entries = self
      .entries
      .read()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    // Keys sharing a segment prefix sort contiguously starting at the prefix
    Ok(
      entries
        .range(prefix.clone()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, _)| key.clone())
        .collect(),
    )
  }
}
