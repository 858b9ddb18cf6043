use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Utf8Bytes;
use tally_core::{Counter, CounterId, Mutation};
use tally_store::{CounterRepo, CounterStore, Database, StoreError};
use tokio::sync::mpsc;

use crate::websocket::connection::ClientConnection;

mockall::mock! {
    pub Store {}

    #[async_trait]
    impl CounterStore for Store {
        async fn fetch_by_id(&self, id: &CounterId) -> Result<Option<Counter>, StoreError>;
        async fn atomic_update(&self, id: &CounterId, mutation: Mutation) -> Result<Option<Counter>, StoreError>;
        async fn ping(&self) -> Result<(), StoreError>;
    }
}

/// In-memory repo holding `c1 = {5, 5, 2, 0, 0}`.
pub fn seeded_repo() -> (CounterRepo, CounterId) {
    let repo = CounterRepo::new(Database::in_memory().unwrap());
    let id = CounterId::from_raw("c1");
    let _ = repo
        .create_with(&Counter {
            count: 5,
            all_time_high: 5,
            player_count: 2,
            ..Counter::new(id.clone())
        })
        .unwrap();
    (repo, id)
}

pub fn connection(capacity: usize) -> (Arc<ClientConnection>, mpsc::Receiver<Utf8Bytes>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Arc::new(ClientConnection::new(tx)), rx)
}

/// Drain every queued frame as JSON.
pub fn drain(rx: &mut mpsc::Receiver<Utf8Bytes>) -> Vec<serde_json::Value> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(serde_json::from_str(msg.as_str()).unwrap());
    }
    out
}
