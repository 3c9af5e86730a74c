//! Per-connection listener state.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::events::FramedMessage;

/// Default outbox capacity. A client this far behind is evicted.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 5;

/// Records queued for a new listener on connect: user list, its name, the
/// history replay and the help hint. The registry never goes below this.
pub const MIN_OUTBOX_CAPACITY: usize = 4;

pub type Outbox = mpsc::Receiver<Arc<FramedMessage>>;

/// A registered stream connection.
pub struct Listener {
    /// Client-supplied identity, also the registry key.
    pub id: String,
    pub display_name: String,
    /// Registration number; distinguishes reconnects that reuse `id`.
    pub session: u64,
    outbox: mpsc::Sender<Arc<FramedMessage>>,
}

/// Result of offering a message to a listener's outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Delivered,
    /// The outbox is full; the listener must be evicted.
    Overflow,
    /// The receiving stream is gone.
    Closed,
}

impl Listener {
    /// Create a listener and the receiving half of its outbox.
    pub fn new(id: String, display_name: String, session: u64, capacity: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let listener = Self {
            id,
            display_name,
            session,
            outbox: tx,
        };
        (listener, rx)
    }

    /// Non-blocking enqueue.
    pub fn offer(&self, message: Arc<FramedMessage>) -> Offer {
        match self.outbox.try_send(message) {
            Ok(()) => Offer::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => Offer::Overflow,
            Err(mpsc::error::TrySendError::Closed(_)) => Offer::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_reports_overflow_once_full() {
        let (listener, _rx) = Listener::new("id".into(), "alice".into(), 1, 2);
        let msg = Arc::new(FramedMessage::notice("hi"));

        assert_eq!(listener.offer(msg.clone()), Offer::Delivered);
        assert_eq!(listener.offer(msg.clone()), Offer::Delivered);
        assert_eq!(listener.offer(msg), Offer::Overflow);
    }

    #[test]
    fn offer_reports_closed_after_receiver_dropped() {
        let (listener, rx) = Listener::new("id".into(), "alice".into(), 1, 2);
        drop(rx);
        assert_eq!(listener.offer(Arc::new(FramedMessage::notice("hi"))), Offer::Closed);
    }

    #[tokio::test]
    async fn outbox_preserves_fifo_order() {
        let (listener, mut rx) = Listener::new("id".into(), "alice".into(), 1, 5);
        for i in 0..3 {
            listener.offer(Arc::new(FramedMessage::notice(format!("m{i}"))));
        }
        for i in 0..3 {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.lines(), vec![format!("m{i}")]);
        }
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (listener, _rx) = Listener::new("id".into(), "alice".into(), 1, 0);
        assert_eq!(listener.offer(Arc::new(FramedMessage::notice("hi"))), Offer::Delivered);
    }
}
