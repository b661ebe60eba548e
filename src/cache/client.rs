//! Query client that orchestrates cache lookups with network fetching.

use color_eyre::{eyre::eyre, Result};
use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::key::QueryKey;
use super::store::{CacheEntry, CacheStore};

/// Result from a cache-aware fetch, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
    }
  }

  pub fn offline(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
    }
  }
}

/// Indicates where fetched data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Network unavailable, serving stale or invalidated cached data
  Offline,
}

/// Write generations per cancelled prefix.
///
/// A key's generation is the highest counter among the prefixes that
/// address it. A fetch only stores its result if that number did not move
/// while the request was in flight.
#[derive(Debug, Default)]
struct Generations {
  counter: u64,
  by_prefix: BTreeMap<QueryKey, u64>,
}

impl Generations {
  fn of(&self, key: &QueryKey) -> u64 {
    self
      .by_prefix
      .iter()
      .filter(|(prefix, _)| key.starts_with(prefix))
      .map(|(_, generation)| *generation)
      .max()
      .unwrap_or(0)
  }

  fn bump(&mut self, prefix: &QueryKey) {
    self.counter += 1;
    self.by_prefix.insert(prefix.clone(), self.counter);
  }
}

/// Shared handle to the process-wide query cache.
///
/// Cloning is cheap; every clone sees the same store.
#[derive(Clone)]
pub struct QueryClient {
  store: Arc<dyn CacheStore>,
  /// How long before cached data is considered stale
  stale_time: Duration,
  generations: Arc<Mutex<Generations>>,
}

impl QueryClient {
  pub fn new(store: Arc<dyn CacheStore>) -> Self {
    Self {
      store,
      stale_time: Duration::minutes(5),
      generations: Arc::new(Mutex::new(Generations::default())),
    }
  }

  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  fn is_fresh(&self, entry: &CacheEntry) -> bool {
    !entry.invalidated && Utc::now() - entry.updated_at <= self.stale_time
  }

  fn generation(&self, key: &QueryKey) -> Result<u64> {
    let generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(generations.of(key))
  }

  /// Fetch with a cache-first strategy.
  ///
  /// 1. Fresh, non-invalidated cache entry: return it without a network call
  /// 2. Otherwise fetch from network and store the result, unless
  ///    [`cancel_queries`](Self::cancel_queries) covered the key meanwhile
  /// 3. On network failure, serve whatever is cached (offline mode)
  pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<CacheResult<T>>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let cached = match self.store.get(key)? {
      Some(entry) => match entry.decode::<T>() {
        Ok(data) => Some((data, entry)),
        Err(e) => {
          warn!(%key, error = %e, "discarding undecodable cache entry");
          self.store.remove(key)?;
          None
        }
      },
      None => None,
    };

    match cached {
      Some((data, entry)) if self.is_fresh(&entry) => {
        debug!(%key, "cache hit");
        Ok(CacheResult::from_cache(data))
      }
      cached => {
        debug!(%key, invalidated = cached.as_ref().map(|(_, e)| e.invalidated), "fetching");
        let started_at = self.generation(key)?;
        match fetcher().await {
          Ok(data) => {
            if self.generation(key)? == started_at {
              self.store.set(key, CacheEntry::encode(&data)?)?;
            } else {
              debug!(%key, "cache written during fetch, dropping superseded result");
            }
            Ok(CacheResult::from_network(data))
          }
          Err(e) => match cached {
            Some((data, _)) => {
              warn!(%key, error = %e, "fetch failed, serving cached data");
              Ok(CacheResult::offline(data))
            }
            None => Err(e),
          },
        }
      }
    }
  }

  /// Keep fetches already in flight under `prefix` from writing their
  /// results to the cache.
  pub fn cancel_queries(&self, prefix: &QueryKey) -> Result<()> {
    self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .bump(prefix);
    Ok(())
  }

  /// Typed read of whatever is cached under `key`, fresh or not.
  pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<T>> {
    self.store.get(key)?.map(|entry| entry.decode()).transpose()
  }

  /// Overwrite the cached value for `key`.
  #[cfg(test)]
  pub fn set_query_data<T: Serialize>(&self, key: &QueryKey, data: &T) -> Result<()> {
    self.store.set(key, CacheEntry::encode(data)?)
  }

  /// Whether the entry under `key` has been invalidated since it was written.
  pub fn is_invalidated(&self, key: &QueryKey) -> Result<bool> {
    Ok(self.store.get(key)?.is_some_and(|entry| entry.invalidated))
  }

  /// Mark every entry addressed by `prefix` stale. Returns how many were.
  pub fn invalidate_queries(&self, prefix: &QueryKey) -> Result<usize> {
    let mut count = 0;
    for key in self.store.keys_with_prefix(prefix)? {
      if self.store.invalidate(&key)? {
        count += 1;
      }
    }
    debug!(%prefix, count, "invalidated queries");
    Ok(count)
  }

  /// Raw entries addressed by `prefix`.
  pub fn entries(&self, prefix: &QueryKey) -> Result<Vec<(QueryKey, CacheEntry)>> {
    let mut entries = Vec::new();
    for key in self.store.keys_with_prefix(prefix)? {
      if let Some(entry) = self.store.get(&key)? {
        entries.push((key, entry));
      }
    }
    Ok(entries)
  }

  /// Write raw entries in one atomic batch.
  pub fn write_entries(&self, entries: Vec<(QueryKey, CacheEntry)>) -> Result<()> {
    if entries.is_empty() {
      return Ok(());
    }
    self.store.set_many(entries)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::MemoryStore;
  use color_eyre::Report;
  use serde_json::json;
  use std::sync::atomic::{AtomicU32, Ordering};
  use tokio::sync::oneshot;

  fn client() -> QueryClient {
    QueryClient::new(Arc::new(MemoryStore::new()))
  }

  fn todos_key() -> QueryKey {
    QueryKey::new("todos").with("filter").with("all")
  }

  #[tokio::test]
  async fn test_fetch_miss_goes_to_network_and_caches() {
    let client = client();

    let result = client
      .fetch(&todos_key(), || async { Ok::<_, Report>(vec![1u32, 2]) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, vec![1, 2]);
    assert_eq!(
      client.get_query_data::<Vec<u32>>(&todos_key()).unwrap(),
      Some(vec![1, 2])
    );
  }

  #[tokio::test]
  async fn test_fresh_entry_skips_network() {
    let client = client();
    client.set_query_data(&todos_key(), &vec![7u32]).unwrap();
    let calls = AtomicU32::new(0);

    let result = client
      .fetch(&todos_key(), || async {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok::<_, Report>(vec![8u32])
      })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::CacheFresh);
    assert_eq!(result.data, vec![7]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_invalidated_entry_is_refetched() {
    let client = client();
    client.set_query_data(&todos_key(), &vec![7u32]).unwrap();
    assert_eq!(client.invalidate_queries(&QueryKey::new("todos")).unwrap(), 1);
    assert!(client.is_invalidated(&todos_key()).unwrap());

    let result = client
      .fetch(&todos_key(), || async { Ok::<_, Report>(vec![8u32]) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data, vec![8]);
    assert!(!client.is_invalidated(&todos_key()).unwrap());
  }

  #[tokio::test]
  async fn test_stale_entry_served_offline_on_failure() {
    let client = client().with_stale_time(Duration::zero());
    client.set_query_data(&todos_key(), &vec![7u32]).unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let result = client
      .fetch(&todos_key(), || async {
        Err::<Vec<u32>, _>(eyre!("connection refused"))
      })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data, vec![7]);
  }

  #[tokio::test]
  async fn test_failure_without_cache_propagates() {
    let client = client();

    let err = client
      .fetch(&todos_key(), || async {
        Err::<Vec<u32>, _>(eyre!("connection refused"))
      })
      .await
      .unwrap_err();

    assert!(err.to_string().contains("connection refused"));
  }

  #[test]
  fn test_write_entries_empty_is_noop() {
    let client = client();
    client.write_entries(Vec::new()).unwrap();
    assert!(client.entries(&QueryKey::new("goals")).unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_cancelled_fetch_does_not_overwrite_newer_write() {
    let client = client();
    let (release, response) = oneshot::channel::<Vec<u32>>();

    let fetching = tokio::spawn({
      let client = client.clone();
      async move {
        client
          .fetch(&todos_key(), || async move { Ok::<_, Report>(response.await?) })
          .await
      }
    });
    tokio::task::yield_now().await;

    client.cancel_queries(&QueryKey::new("todos")).unwrap();
    client.set_query_data(&todos_key(), &vec![2u32]).unwrap();
    release.send(vec![1]).unwrap();

    let result = fetching.await.unwrap().unwrap();
    assert_eq!(result.data, vec![1]);
    assert_eq!(
      client.get_query_data::<Vec<u32>>(&todos_key()).unwrap(),
      Some(vec![2])
    );
  }

  #[tokio::test]
  async fn test_cancel_leaves_other_prefixes_alone() {
    let client = client();
    let notes = QueryKey::new("notes");

    let result = client
      .fetch(&notes, || async {
        client.cancel_queries(&QueryKey::new("todos")).unwrap();
        Ok::<_, Report>(vec![3u32])
      })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(client.get_query_data::<Vec<u32>>(&notes).unwrap(), Some(vec![3]));
  }

  #[tokio::test]
  async fn test_undecodable_entry_is_dropped_and_refetched() {
    let client = client();
    client.set_query_data(&todos_key(), &json!({"not": "a list"})).unwrap();

    let result = client
      .fetch(&todos_key(), || async { Err::<Vec<u32>, _>(eyre!("offline")) })
      .await;

    assert!(result.is_err());
    assert!(client.entries(&todos_key()).unwrap().is_empty());
  }
}
