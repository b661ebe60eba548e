//! Per-mutation snapshot and lifecycle state.

use color_eyre::Result;

use crate::cache::{CacheEntry, QueryClient, QueryKey};

/// Lifecycle of one mutation instance.
///
/// `Confirmed` and `RolledBack` are terminal; toggling again starts a new
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
  Idle,
  OptimisticallyApplied,
  Confirmed,
  RolledBack,
}

impl MutationState {
  /// Whether `next` is a legal successor of this state
  pub fn can_advance_to(&self, next: MutationState) -> bool {
    matches!(
      (self, next),
      (Self::Idle, Self::OptimisticallyApplied)
        | (Self::OptimisticallyApplied, Self::Confirmed)
        | (Self::OptimisticallyApplied, Self::RolledBack)
    )
  }
}

/// Cache entries captured right before an optimistic write.
///
/// Owned by a single in-flight mutation and dropped once it settles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationContext {
  entries: Vec<(QueryKey, CacheEntry)>,
}

impl MutationContext {
  /// Snapshot every entry addressed by `prefix`.
  pub fn capture(client: &QueryClient, prefix: &QueryKey) -> Result<Self> {
    Ok(Self {
      entries: client.entries(prefix)?,
    })
  }

  pub fn entries(&self) -> &[(QueryKey, CacheEntry)] {
    &self.entries
  }

  /// Nothing was cached, so there is nothing to roll back.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Put every captured entry back exactly as it was, in one batch.
  pub fn restore(self, client: &QueryClient) -> Result<()> {
    client.write_entries(self.entries)
  }
}
