//! HTTP request handlers.

pub mod metrics;
pub mod rooms;

pub use metrics::metrics_handler;
pub use rooms::{get_room, list_rooms};
