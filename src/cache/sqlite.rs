//! SQLite-backed cache store, used to start up offline from the last
//! session's data.

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::key::QueryKey;
use super::store::{CacheEntry, CacheStore};

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- One row per cached query (value stored as serialized JSON)
CREATE TABLE IF NOT EXISTS query_cache (
    query_hash TEXT PRIMARY KEY,
    query_key TEXT NOT NULL,
    data BLOB NOT NULL,
    updated_at TEXT NOT NULL,
    invalidated INTEGER NOT NULL DEFAULT 0
);
"#;

/// SQLite-based cache store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Store backed by a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to create cache schema: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("daybook").join("cache.db"))
  }
}

impl CacheStore for SqliteStore {
  fn get(&self, key: &QueryKey) -> Result<Option<CacheEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row: Option<(Vec<u8>, String, bool)> = conn
      .query_row(
        "SELECT data, updated_at, invalidated FROM query_cache WHERE query_hash = ?",
        params![key.cache_hash()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", key, e))?;

    match row {
      Some((data, updated_at, invalidated)) => {
        let value = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize cache entry {}: {}", key, e))?;
        Ok(Some(CacheEntry {
          value,
          updated_at: parse_timestamp(&updated_at)?,
          invalidated,
        }))
      }
      None => Ok(None),
    }
  }

  fn set_many(&self, entries: Vec<(QueryKey, CacheEntry)>) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (key, entry) in &entries {
      let segments = serde_json::to_string(key)
        .map_err(|e| eyre!("Failed to serialize cache key {}: {}", key, e))?;
      let data = serde_json::to_vec(&entry.value)
        .map_err(|e| eyre!("Failed to serialize cache entry {}: {}", key, e))?;

      tx.execute(
        "INSERT OR REPLACE INTO query_cache (query_hash, query_key, data, updated_at, invalidated)
         VALUES (?, ?, ?, ?, ?)",
        params![
          key.cache_hash(),
          segments,
          data,
          format_timestamp(&entry.updated_at),
          entry.invalidated
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry {}: {}", key, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn invalidate(&self, key: &QueryKey) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let updated = conn
      .execute(
        "UPDATE query_cache SET invalidated = 1 WHERE query_hash = ?",
        params![key.cache_hash()],
      )
      .map_err(|e| eyre!("Failed to invalidate cache entry {}: {}", key, e))?;

    Ok(updated > 0)
  }

  fn remove(&self, key: &QueryKey) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM query_cache WHERE query_hash = ?",
        params![key.cache_hash()],
      )
      .map_err(|e| eyre!("Failed to remove cache entry {}: {}", key, e))?;

    Ok(())
  }

  fn keys_with_prefix(&self, prefix: &QueryKey) -> Result<Vec<QueryKey>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT query_key FROM query_cache")
      .map_err(|e| eyre!("Failed to prepare key query: {}", e))?;

    let raw_keys: Vec<String> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query cache keys: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read cache keys: {}", e))?;

    let mut keys = Vec::new();
    for raw in raw_keys {
      let key: QueryKey = serde_json::from_str(&raw)
        .map_err(|e| eyre!("Failed to parse cache key '{}': {}", raw, e))?;
      if key.starts_with(prefix) {
        keys.push(key);
      }
    }
    keys.sort();

    Ok(keys)
  }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
  ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse timestamp '{}': {}", s, e))
}
