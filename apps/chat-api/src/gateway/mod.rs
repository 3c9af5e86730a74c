//! Listener registry and message-dispatch engine.
//!
//! Leaf-first: [`events`] frames records, [`history`] keeps recent chat,
//! [`listener`] holds per-connection state, [`announcer`] owns the registry and
//! delivers, [`commands`] interprets `!` commands, [`dispatch`] is the surface
//! the HTTP layer calls and [`server`] streams outboxes to clients.

pub mod announcer;
pub mod commands;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod history;
pub mod listener;
pub mod moderation;
pub mod server;

pub use announcer::{Announcer, AnnouncerConfig};
pub use dispatch::{Connection, DispatchConfig, Dispatcher, MessageOutcome};
pub use error::GatewayError;
pub use events::{frame, EventName, FramedMessage, Payload};
