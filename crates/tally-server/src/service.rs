//! Counter state service.
//!
//! Applies the four mutations through the store's atomic primitive and
//! projects the returned post-mutation row onto the mutation's payload.

use std::sync::Arc;

use tally_core::{Counter, CounterError, CounterId, CounterUpdate, Mutation};
use tally_store::{CounterStore, StoreError};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct CounterService {
    store: Arc<dyn CounterStore>,
}

impl CounterService {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// `count + 1`, raising `allTimeHigh` when exceeded.
    pub async fn increment(&self, id: &CounterId) -> Result<CounterUpdate, CounterError> {
        self.apply(id, Mutation::Increment).await
    }

    /// Zero `count` and `playerCount`, bump `resetCount`.
    pub async fn reset(&self, id: &CounterId) -> Result<CounterUpdate, CounterError> {
        self.apply(id, Mutation::Reset).await
    }

    /// Bump `playerCount`.
    pub async fn first_load(&self, id: &CounterId) -> Result<CounterUpdate, CounterError> {
        self.apply(id, Mutation::FirstLoad).await
    }

    /// Bump `regretCount`.
    pub async fn regret(&self, id: &CounterId) -> Result<CounterUpdate, CounterError> {
        self.apply(id, Mutation::Regret).await
    }

    /// Apply `mutation` atomically and return its payload.
    ///
    /// The payload is built from the row the store returns for this very
    /// update, never from an earlier read.
    #[instrument(skip(self), fields(counter_id = %id, event = %mutation))]
    pub async fn apply(&self, id: &CounterId, mutation: Mutation) -> Result<CounterUpdate, CounterError> {
        let counter = self
            .store
            .atomic_update(id, mutation)
            .await
            .map_err(unavailable)?
            .ok_or_else(|| CounterError::NotFound(id.clone()))?;
        debug!(count = counter.count, "counter mutated");
        Ok(CounterUpdate::project(mutation, &counter))
    }

    /// Full current record.
    #[instrument(skip(self), fields(counter_id = %id))]
    pub async fn snapshot(&self, id: &CounterId) -> Result<Counter, CounterError> {
        self.store
            .fetch_by_id(id)
            .await
            .map_err(unavailable)?
            .ok_or_else(|| CounterError::NotFound(id.clone()))
    }

    /// Whether the store answers a trivial query.
    pub async fn store_reachable(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}

fn unavailable(err: StoreError) -> CounterError {
    CounterError::StoreUnavailable(err.to_string())
}
