//! # tally-server
//!
//! Axum HTTP + `WebSocket` server for shared counters.
//!
//! - `WebSocket` gateway: connection registry, heartbeat, frame parsing
//! - Event router: named inbound events to counter mutations
//! - Counter state service over the [`tally_store::CounterStore`] contract
//! - Global (or opt-in topic-scoped) fan-out of `counterUpdated` messages
//! - HTTP endpoints: `/health`, `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod protocol;
pub mod router;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use router::{EventOutcome, EventRouter};
pub use server::{AppState, ServerHandle, TallyServer};
pub use service::CounterService;
pub use shutdown::ShutdownCoordinator;
