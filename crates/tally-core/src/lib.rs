//! # tally-core
//!
//! Shared types for the tally counter service.
//!
//! - [`Counter`]: the persisted record and its invariants
//! - [`Mutation`]: the four defined transformations and their pure semantics
//! - [`CounterUpdate`]: the exact partial snapshot broadcast after each mutation
//! - [`CounterError`]: failures surfaced by the counter state service

#![deny(unsafe_code)]

pub mod counter;
pub mod errors;
pub mod ids;
pub mod mutation;
pub mod update;

pub use counter::Counter;
pub use errors::CounterError;
pub use ids::{ConnectionId, CounterId};
pub use mutation::{Mutation, UnknownMutation};
pub use update::CounterUpdate;
