//! Errors surfaced by the dispatch engine.
//!
//! None of these are fatal: callers reject the request, log, or ignore.
//! Overflow eviction is deliberately absent; it is a state transition handled
//! inside the announcer, not something a caller can observe as a failure.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// A line or event name would break the record framing.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Broadcast of a message with no content.
    #[error("message has no content")]
    EmptyPayload,

    /// Unicast or client request for an id that is not registered.
    #[error("unknown listener: {0}")]
    UnknownListener(String),
}
