//! Actor system for the poker service.
//!
//! A single `RoomControllerActor` owns all room and connection state. Other
//! tasks talk to it only through a cloneable `RoomControllerHandle`.
//!
//! ```text
//! ws session --(ControllerMessage)--> RoomControllerActor
//!     ^                                  |  RoomStore
//!     |                                  |  ConnectionRegistry
//!     +------(ServerEvent, bounded)------+  Dispatcher
//! ```

pub mod controller;
pub mod dispatch;
pub mod messages;
pub mod metrics;
pub mod registry;

pub use controller::{ControllerSettings, RoomControllerActor, RoomControllerHandle};
pub use dispatch::{Dispatcher, Publication};
pub use messages::{CommandOutcome, ControllerMessage, ControllerStatus};
pub use metrics::{ActorMetrics, MailboxMonitor};
pub use registry::{ConnectionRegistry, Delivery};
