//! chatrelay - A WebSocket chat relay with a live roster
//!
//! This crate provides:
//! - The relay core: identity registry, per-connection sessions, message
//!   routing and presence notifications
//! - A JSON wire protocol
//! - An HTTP/WebSocket server that serves the chat page and hosts sessions
//! - Configuration management
//!
//! # Architecture
//!
//! Each accepted WebSocket gets its own task running a [`relay::Session`].
//! Sessions share one [`relay::Relay`], whose registry is the only shared
//! mutable state. Outbound frames go through bounded per-connection queues,
//! so a slow client only ever delays its own deliveries.

pub mod config;
pub mod protocol;
pub mod relay;
pub mod server;
