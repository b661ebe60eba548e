//! Composite cache keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Ordered list of segments identifying a cached query, e.g.
/// `goals:date:2026-10-17:filter:all`.
///
/// Keys form a hierarchy: a shorter key is a prefix of every key that
/// extends it, which is how a mutation addresses all the queries it may
/// affect.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
  /// Start a key with its entity name.
  pub fn new(entity: impl Into<String>) -> Self {
    Self(vec![entity.into()])
  }

  /// Append a segment.
  pub fn with(mut self, segment: impl fmt::Display) -> Self {
    self.0.push(segment.to_string());
    self
  }

  /// Whether `prefix` addresses this key (a key is a prefix of itself).
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.starts_with(&prefix.0)
  }

  /// SHA256 of the display form, for stable fixed-length storage keys.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.to_string().as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.join(":"))
  }
}
