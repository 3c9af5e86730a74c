//! Listener registry and message delivery.
//!
//! All registry state and the chat history live behind one
//! `parking_lot::Mutex`. Every mutation and every delivery loop runs inside
//! that critical section, and nothing inside it awaits: outbox writes are
//! `try_send`, so a stalled client can never hold up a producer.
//!
//! Backpressure policy: a listener whose outbox is full is evicted, and the
//! room is told `"<name> connection timed out."`. Notices caused by a delivery
//! are queued and sent after that delivery finishes, never mid-iteration.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::GatewayError;
use super::events::{EventName, FramedMessage};
use super::history::{ChatHistory, DEFAULT_HISTORY_LIMIT};
use super::listener::{
    Listener, Offer, Outbox, DEFAULT_OUTBOX_CAPACITY, MIN_OUTBOX_CAPACITY,
};

/// Configuration for [`Announcer`].
#[derive(Debug, Clone)]
pub struct AnnouncerConfig {
    /// Messages a listener may have queued before it is evicted. Raised to
    /// [`MIN_OUTBOX_CAPACITY`] when smaller.
    pub outbox_capacity: usize,
    /// Chat lines kept for replay to new listeners.
    pub history_limit: usize,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Handed to the stream that owns a new registration.
pub struct Subscription {
    pub session: u64,
    pub outbox: Outbox,
}

/// Owns every listener and performs all delivery.
pub struct Announcer {
    inner: Mutex<Inner>,
    cfg: AnnouncerConfig,
}

impl Announcer {
    pub fn new(mut cfg: AnnouncerConfig) -> Self {
        cfg.outbox_capacity = cfg.outbox_capacity.max(MIN_OUTBOX_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                listeners: HashMap::new(),
                history: ChatHistory::new(cfg.history_limit),
                next_session: 0,
            }),
            cfg,
        }
    }

    pub fn config(&self) -> &AnnouncerConfig {
        &self.cfg
    }

    /// Register `id`, replacing any listener already holding it, then refresh
    /// everyone's user list.
    ///
    /// A replaced listener's outbox is closed, which ends its stream.
    pub fn register(&self, id: &str, display_name: &str) -> Subscription {
        let mut inner = self.inner.lock();
        let subscription = inner.insert(id, display_name, self.cfg.outbox_capacity);
        inner.drain(VecDeque::from([Pending::UserList]));
        subscription
    }

    /// [`register`](Self::register), then queue the records `greeting` builds
    /// from the chat history, all in one critical section.
    ///
    /// No other producer can reach the new outbox before the greeting, so a
    /// greeting of up to `MIN_OUTBOX_CAPACITY - 1` records always fits. If a
    /// longer one overflows, the listener is evicted and this fails with
    /// [`GatewayError::UnknownListener`].
    pub fn join<F>(
        &self,
        id: &str,
        display_name: &str,
        greeting: F,
    ) -> Result<Subscription, GatewayError>
    where
        F: FnOnce(&ChatHistory) -> Vec<FramedMessage>,
    {
        let mut inner = self.inner.lock();
        let subscription = inner.insert(id, display_name, self.cfg.outbox_capacity);
        inner.drain(VecDeque::from([Pending::UserList]));

        let records = greeting(&inner.history);
        for message in records {
            if let Some(departure) = inner.deliver_one(id, Arc::new(message))? {
                inner.drain(departure.follow_ups());
                return Err(GatewayError::UnknownListener(id.to_string()));
            }
        }
        Ok(subscription)
    }

    /// Deliver `message` to one listener.
    ///
    /// Fails with [`GatewayError::UnknownListener`] when `id` is not
    /// registered. A full outbox evicts the listener; that is not an error.
    pub fn unicast(&self, id: &str, message: FramedMessage) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();
        let departure = inner.deliver_one(id, Arc::new(message))?;
        if let Some(departure) = departure {
            inner.drain(departure.follow_ups());
        }
        Ok(())
    }

    /// Deliver `message` to every registered listener.
    ///
    /// Chat content (no event name) is appended to history first, so the
    /// record survives even when nobody is listening.
    pub fn broadcast(&self, message: FramedMessage) -> Result<(), GatewayError> {
        if message.payload().is_empty() {
            return Err(GatewayError::EmptyPayload);
        }
        let mut inner = self.inner.lock();
        inner.drain(VecDeque::from([Pending::Message(Arc::new(message))]));
        Ok(())
    }

    /// Send the current user list to everyone.
    pub fn refresh_user_list(&self) {
        self.inner.lock().drain(VecDeque::from([Pending::UserList]));
    }

    /// Display names of all registered listeners, sorted.
    pub fn user_list(&self) -> Vec<String> {
        self.inner.lock().user_list()
    }

    pub fn display_name(&self, id: &str) -> Option<String> {
        self.inner
            .lock()
            .listeners
            .get(id)
            .map(|l| l.display_name.clone())
    }

    /// Change a listener's display name. Returns the previous name.
    ///
    /// Validation is the caller's job; this only swaps the value.
    pub fn rename(&self, id: &str, new_name: &str) -> Result<String, GatewayError> {
        let mut inner = self.inner.lock();
        let listener = inner
            .listeners
            .get_mut(id)
            .ok_or_else(|| GatewayError::UnknownListener(id.to_string()))?;
        let previous = std::mem::replace(&mut listener.display_name, new_name.to_string());
        tracing::info!(listener_id = %id, from = %previous, to = %new_name, "listener renamed");
        Ok(previous)
    }

    /// Remove a listener and tell the room it left.
    ///
    /// With `Some(session)`, only that registration is removed; a stream that
    /// was superseded by a reconnect cannot knock out its replacement.
    /// Returns whether anything was removed.
    pub fn disconnect(&self, id: &str, session: Option<u64>) -> bool {
        let mut inner = self.inner.lock();
        let matches = inner
            .listeners
            .get(id)
            .is_some_and(|l| session.map_or(true, |s| s == l.session));
        if !matches {
            return false;
        }

        if let Some(departure) = inner.remove(id, Removal::Left) {
            inner.drain(departure.follow_ups());
        }
        true
    }

    /// Up to the last `n` history entries, oldest first.
    pub fn recent_history(&self, n: usize) -> Vec<Arc<FramedMessage>> {
        self.inner.lock().history.recent(n)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().listeners.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Announcer {
    fn default() -> Self {
        Self::new(AnnouncerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Internals (always called with the lock held)
// ---------------------------------------------------------------------------

struct Inner {
    listeners: HashMap<String, Listener>,
    history: ChatHistory,
    next_session: u64,
}

/// Work queued behind the delivery in progress.
enum Pending {
    Message(Arc<FramedMessage>),
    /// Built when dequeued, so it reflects every removal made before it.
    UserList,
}

/// Why a listener is being taken out of the registry.
#[derive(Debug, Clone, Copy)]
enum Removal {
    Overflow,
    Left,
}

impl Removal {
    /// The removal a failed offer calls for, if any.
    fn after(offer: Offer) -> Option<Self> {
        match offer {
            Offer::Delivered => None,
            Offer::Overflow => Some(Removal::Overflow),
            Offer::Closed => Some(Removal::Left),
        }
    }
}

/// Who left the registry, and how, for the notice sent to the room.
enum Departure {
    TimedOut(String),
    Left(String),
}

impl Departure {
    fn notice(&self) -> FramedMessage {
        match self {
            Departure::TimedOut(name) => FramedMessage::notice(format!("{name} connection timed out.")),
            Departure::Left(name) => FramedMessage::notice(format!("{name} has left the chat.")),
        }
    }

    fn follow_ups(&self) -> VecDeque<Pending> {
        VecDeque::from([Pending::Message(Arc::new(self.notice())), Pending::UserList])
    }
}

impl Inner {
    fn insert(&mut self, id: &str, display_name: &str, capacity: usize) -> Subscription {
        self.next_session += 1;
        let session = self.next_session;

        let (listener, outbox) =
            Listener::new(id.to_string(), display_name.to_string(), session, capacity);
        if let Some(previous) = self.listeners.insert(id.to_string(), listener) {
            tracing::debug!(
                listener_id = %id,
                previous_session = previous.session,
                session,
                "listener replaced by reconnect"
            );
        }

        tracing::info!(
            listener_id = %id,
            display_name = %display_name,
            session,
            listeners = self.listeners.len(),
            "listener registered"
        );
        Subscription { session, outbox }
    }

    fn user_list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .listeners
            .values()
            .map(|l| l.display_name.clone())
            .collect();
        names.sort();
        names
    }

    /// `(session, id)` pairs, most recently registered first.
    fn snapshot(&self) -> Vec<(u64, String)> {
        let mut ids: Vec<(u64, String)> = self
            .listeners
            .values()
            .map(|l| (l.session, l.id.clone()))
            .collect();
        ids.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        ids
    }

    fn deliver_one(
        &mut self,
        id: &str,
        message: Arc<FramedMessage>,
    ) -> Result<Option<Departure>, GatewayError> {
        let listener = self
            .listeners
            .get(id)
            .ok_or_else(|| GatewayError::UnknownListener(id.to_string()))?;

        let offer = listener.offer(message);
        Ok(Removal::after(offer).and_then(|reason| self.remove(id, reason)))
    }

    /// Deliver one message to the snapshot and return who had to be removed.
    fn fan_out(&mut self, message: &Arc<FramedMessage>) -> Vec<Departure> {
        if message.is_chat() {
            self.history.append(message.clone());
        }

        let mut failed = Vec::new();
        for (session, id) in self.snapshot() {
            let Some(listener) = self.listeners.get(&id) else {
                continue;
            };
            if listener.session != session {
                continue;
            }
            if let Some(reason) = Removal::after(listener.offer(message.clone())) {
                failed.push((id, reason));
            }
        }

        failed
            .into_iter()
            .filter_map(|(id, reason)| self.remove(&id, reason))
            .collect()
    }

    fn remove(&mut self, id: &str, reason: Removal) -> Option<Departure> {
        let listener = self.listeners.remove(id)?;
        match reason {
            Removal::Overflow => {
                tracing::warn!(
                    listener_id = %id,
                    display_name = %listener.display_name,
                    "listener evicted: outbox full"
                );
                Some(Departure::TimedOut(listener.display_name))
            }
            Removal::Left => {
                tracing::info!(
                    listener_id = %id,
                    display_name = %listener.display_name,
                    "listener disconnected"
                );
                Some(Departure::Left(listener.display_name))
            }
        }
    }

    /// Run queued deliveries until none are left. Each removal queues its
    /// notice plus one user-list refresh per batch.
    fn drain(&mut self, mut queue: VecDeque<Pending>) {
        while let Some(item) = queue.pop_front() {
            let message = match item {
                Pending::Message(message) => message,
                Pending::UserList => {
                    if self.listeners.is_empty() {
                        continue;
                    }
                    Arc::new(FramedMessage::event(EventName::USER_LIST, self.user_list()))
                }
            };

            let departures = self.fan_out(&message);
            if departures.is_empty() {
                continue;
            }
            for departure in &departures {
                queue.push_back(Pending::Message(Arc::new(departure.notice())));
            }
            queue.push_back(Pending::UserList);
        }
    }
}
