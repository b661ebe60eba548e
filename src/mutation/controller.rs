//! Optimistic mutation controller.
//!
//! A mutation runs in two halves:
//!
//! 1. [`MutationController::begin`] snapshots every cache entry the
//!    mutation may affect and synchronously overwrites them with the
//!    anticipated result, before any network traffic.
//! 2. [`PendingMutation::settle`] issues the remote call. On success the
//!    server's answer is written over the optimistic value and the affected
//!    queries are invalidated so the next read refetches. On failure the
//!    snapshot is restored in one atomic batch and exactly one error
//!    notification is raised.
//!
//! Mutations on the same key are not serialized: whichever settles last
//! decides what is cached.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::ApiError;
use crate::cache::{CacheEntry, QueryClient, QueryKey};

use super::context::{MutationContext, MutationState};
use super::notify::{Notification, Notifier};

/// A remote state change with a locally predictable effect on cached data.
#[async_trait]
pub trait OptimisticMutation: Send + Sync {
  /// Shape of every cached value under [`affected`](Self::affected)
  type Data: Serialize + DeserializeOwned + Send;
  /// What the server returns on success
  type Output: Send;

  /// Short verb phrase used in logs and notifications ("toggle goal 3")
  fn describe(&self) -> String;

  /// Prefix addressing every cached query this mutation may change
  fn affected(&self) -> QueryKey;

  /// Apply the anticipated result to one cached value
  fn apply_optimistic(&self, data: &mut Self::Data);

  /// Perform the remote call
  async fn commit(&self) -> Result<Self::Output, ApiError>;

  /// Write the server-confirmed result over one cached value
  fn reconcile(&self, _output: &Self::Output, _data: &mut Self::Data) {}
}

/// How a mutation settled.
#[derive(Debug)]
pub enum MutationOutcome<T> {
  Confirmed(T),
  RolledBack(ApiError),
}

#[cfg(test)]
impl<T> MutationOutcome<T> {
  pub fn is_confirmed(&self) -> bool {
    matches!(self, Self::Confirmed(_))
  }
}

/// Runs optimistic mutations against a shared query cache.
#[derive(Clone)]
pub struct MutationController {
  client: QueryClient,
  notifier: Arc<dyn Notifier>,
}

impl MutationController {
  pub fn new(client: QueryClient, notifier: Arc<dyn Notifier>) -> Self {
    Self { client, notifier }
  }

  #[cfg(test)]
  pub fn client(&self) -> &QueryClient {
    &self.client
  }

  /// Snapshot the affected entries and apply the optimistic update.
  ///
  /// Fetches already in flight for the affected queries are cancelled so
  /// they cannot land on top of the optimistic value. Cache failures are
  /// logged and leave the cache untouched; the remote call still goes
  /// ahead when the mutation is settled.
  pub fn begin<M: OptimisticMutation>(&self, mutation: M) -> PendingMutation<M> {
    let prefix = mutation.affected();
    let mut pending = PendingMutation {
      mutation,
      context: MutationContext::default(),
      state: MutationState::Idle,
      client: self.client.clone(),
      notifier: Arc::clone(&self.notifier),
    };

    if let Err(e) = self.client.cancel_queries(&prefix) {
      warn!(%prefix, error = %e, "failed to cancel in-flight queries");
    }

    match MutationContext::capture(&self.client, &prefix) {
      Ok(context) => pending.context = context,
      Err(e) => warn!(%prefix, error = %e, "could not snapshot cache, skipping optimistic update"),
    }

    if pending.context.is_empty() {
      debug!(%prefix, "nothing cached, no optimistic update");
    } else {
      let optimistic = patch_entries::<M::Data>(pending.context.entries(), |data| {
        pending.mutation.apply_optimistic(data)
      });
      if let Err(e) = self.client.write_entries(optimistic) {
        warn!(%prefix, error = %e, "failed to write optimistic update");
      }
    }

    pending.advance(MutationState::OptimisticallyApplied);
    debug!(
      mutation = %pending.mutation.describe(),
      keys = pending.context.entries().len(),
      "optimistic update applied"
    );
    pending
  }

  /// Run a mutation to completion.
  #[cfg(test)]
  pub async fn execute<M: OptimisticMutation>(&self, mutation: M) -> MutationOutcome<M::Output> {
    self.begin(mutation).settle().await
  }

  /// Apply the optimistic update now and settle on a background task.
  ///
  /// The task is detached from the caller, so the cache is still confirmed
  /// or rolled back if the view that started the mutation goes away.
  pub fn spawn<M>(&self, mutation: M) -> JoinHandle<MutationOutcome<M::Output>>
  where
    M: OptimisticMutation + 'static,
    M::Output: 'static,
  {
    let pending = self.begin(mutation);
    tokio::spawn(pending.settle())
  }
}

/// A mutation whose optimistic update is applied and whose remote call
/// has not settled yet.
pub struct PendingMutation<M: OptimisticMutation> {
  mutation: M,
  context: MutationContext,
  state: MutationState,
  client: QueryClient,
  notifier: Arc<dyn Notifier>,
}

impl<M: OptimisticMutation> PendingMutation<M> {
  #[cfg(test)]
  pub fn state(&self) -> MutationState {
    self.state
  }

  /// Entries captured before the optimistic write
  #[cfg(test)]
  pub fn snapshot(&self) -> &MutationContext {
    &self.context
  }

  fn advance(&mut self, next: MutationState) {
    debug_assert!(
      self.state.can_advance_to(next),
      "illegal mutation transition {:?} -> {:?}",
      self.state,
      next
    );
    self.state = next;
  }

  /// Issue the remote call and confirm or roll back.
  pub async fn settle(mut self) -> MutationOutcome<M::Output> {
    let description = self.mutation.describe();

    match self.mutation.commit().await {
      Ok(output) => {
        self.confirm(&output);
        self.advance(MutationState::Confirmed);
        info!(mutation = %description, "mutation confirmed");
        MutationOutcome::Confirmed(output)
      }
      Err(err) => {
        warn!(mutation = %description, error = %err, "mutation failed, rolling back");
        let context = std::mem::take(&mut self.context);
        if let Err(e) = context.restore(&self.client) {
          error!(mutation = %description, error = %e, "rollback failed");
        }
        self.advance(MutationState::RolledBack);
        self
          .notifier
          .notify(Notification::error(format!("Failed to {}: {}", description, err)));
        MutationOutcome::RolledBack(err)
      }
    }
  }

  /// Write the server's answer over the optimistic value, then mark the
  /// affected queries stale.
  fn confirm(&self, output: &M::Output) {
    let prefix = self.mutation.affected();

    // A fetch started before the server applied the change answers with
    // the old state; it must not replace the confirmed value.
    if let Err(e) = self.client.cancel_queries(&prefix) {
      warn!(%prefix, error = %e, "failed to cancel in-flight queries");
    }

    match self.client.entries(&prefix) {
      Ok(current) => {
        let reconciled = patch_entries::<M::Data>(&current, |data| {
          self.mutation.reconcile(output, data)
        });
        if let Err(e) = self.client.write_entries(reconciled) {
          warn!(%prefix, error = %e, "failed to write confirmed value");
        }
      }
      Err(e) => warn!(%prefix, error = %e, "failed to read cache for reconcile"),
    }

    if let Err(e) = self.client.invalidate_queries(&prefix) {
      warn!(%prefix, error = %e, "failed to invalidate queries");
    }
  }
}

/// Decode each entry as `D`, apply `f`, and re-encode. Entries that do not
/// decode as `D` are left alone.
fn patch_entries<D>(
  entries: &[(QueryKey, CacheEntry)],
  f: impl Fn(&mut D),
) -> Vec<(QueryKey, CacheEntry)>
where
  D: Serialize + DeserializeOwned,
{
  entries
    .iter()
    .filter_map(|(key, entry)| {
      let mut data: D = match entry.decode() {
        Ok(data) => data,
        Err(e) => {
          warn!(%key, error = %e, "skipping cache entry of unexpected shape");
          return None;
        }
      };
      f(&mut data);
      match CacheEntry::encode(&data) {
        Ok(patched) => Some((key.clone(), patched)),
        Err(e) => {
          warn!(%key, error = %e, "failed to encode patched entry");
          None
        }
      }
    })
    .collect()
}
