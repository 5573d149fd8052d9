//! Planning Poker room service library.
//!
//! An in-memory room synchronization server. Clients connect over a
//! WebSocket, create or join short-lived rooms, cast hidden votes and reveal
//! them together. Every change is pushed to room members as a full room
//! snapshot, and lobby changes are pushed to every connection.
//!
//! # Architecture
//!
//! ```text
//! routes.rs -> ws/ (one session per socket) -> actors/ (single controller)
//!                                                  -> room/ (pure domain)
//! ```
//!
//! # Modules
//!
//! - `actors` - the controller task that owns all room and connection state
//! - `config` - service configuration from environment
//! - `errors` - error types with wire code and HTTP status mapping
//! - `handlers` - read-only HTTP handlers
//! - `middleware` - HTTP request metrics
//! - `observability` - health probes and Prometheus metrics
//! - `protocol` - JSON wire messages
//! - `room` - room store, identity, votes and authority rules
//! - `routes` - Axum router setup
//! - `ws` - WebSocket transport

pub mod actors;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod protocol;
pub mod room;
pub mod routes;
pub mod ws;
