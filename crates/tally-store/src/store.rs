//! Async store contract consumed by the counter state service.

use async_trait::async_trait;
use tally_core::{Counter, CounterId, Mutation};

use crate::counters::CounterRepo;
use crate::error::StoreError;

/// Persisted counter store.
///
/// `atomic_update` must compute the new row from the current stored row in
/// one step, so concurrent callers on the same id never lose an update.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Fetch a counter. `Ok(None)` when it does not exist.
    async fn fetch_by_id(&self, id: &CounterId) -> Result<Option<Counter>, StoreError>;

    /// Apply `mutation` atomically and return the post-mutation record.
    /// `Ok(None)` when the counter does not exist.
    async fn atomic_update(&self, id: &CounterId, mutation: Mutation) -> Result<Option<Counter>, StoreError>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<(), StoreError>;
}

// rusqlite calls block; run them on the blocking pool so a slow disk never
// stalls the async workers serving other connections.
#[async_trait]
impl CounterStore for CounterRepo {
    async fn fetch_by_id(&self, id: &CounterId) -> Result<Option<Counter>, StoreError> {
        let repo = self.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || repo.fetch_by_id(&id)).await?
    }

    async fn atomic_update(&self, id: &CounterId, mutation: Mutation) -> Result<Option<Counter>, StoreError> {
        let repo = self.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || repo.atomic_update(&id, mutation)).await?
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let repo = self.clone();
        tokio::task::spawn_blocking(move || repo.ping()).await?
    }
}
