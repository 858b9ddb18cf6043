//! WebSocket connection management, heartbeat, socket loop, and broadcasting.

pub mod broadcast;
pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod registry;
