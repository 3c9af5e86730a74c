//! Bounded chat history replayed to listeners when they join.

use std::collections::VecDeque;
use std::sync::Arc;

use super::events::FramedMessage;

/// Default number of chat lines kept for replay.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Append-only log of chat records. Evicts the oldest entry once `limit` is
/// exceeded, so memory stays bounded no matter how long the server runs.
#[derive(Debug)]
pub struct ChatHistory {
    entries: VecDeque<Arc<FramedMessage>>,
    limit: usize,
}

impl ChatHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            limit,
        }
    }

    pub fn append(&mut self, message: Arc<FramedMessage>) {
        self.entries.push_back(message);
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    /// Up to the last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Arc<FramedMessage>> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
