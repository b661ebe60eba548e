//! Process-wide query cache.
//!
//! This module is independent of the backend's entity types:
//! - Entries are keyed by hierarchical `QueryKey`s and hold JSON values
//! - Stores are injectable (`MemoryStore` by default, `SqliteStore` to keep
//!   data across restarts)
//! - `QueryClient` adds cache-first fetching, invalidation and offline
//!   fallback on top of a store

mod client;
mod key;
mod sqlite;
mod store;

pub use client::{CacheSource, QueryClient};
pub use key::QueryKey;
pub use sqlite::SqliteStore;
pub use store::{CacheEntry, CacheStore, MemoryStore};
