//! Server module - HTTP listener and WebSocket connection handling
//!
//! This is the transport around the relay core: it serves the chat page,
//! upgrades WebSocket requests, and pumps frames between sockets and sessions.

mod connection;
mod listener;

pub use connection::{client_writer_task, inbound_frames, serve_socket};
pub use listener::{log_addresses, RelayServer};
