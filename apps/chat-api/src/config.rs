use std::str::FromStr;

use crate::gateway::history::DEFAULT_HISTORY_LIMIT;
use crate::gateway::listener::{DEFAULT_OUTBOX_CAPACITY, MIN_OUTBOX_CAPACITY};
use crate::gateway::{AnnouncerConfig, DispatchConfig};

/// Chat API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Records a listener may have queued before it is evicted. Never below
    /// [`MIN_OUTBOX_CAPACITY`], the size of the connect greeting.
    pub outbox_capacity: usize,
    /// Chat lines replayed to new listeners.
    pub history_limit: usize,
    /// Words that turn a message into a private warning.
    pub blocked_words: Vec<String>,
    /// Prefix chat lines with `[HH:MM]`.
    pub timestamps: bool,
    /// Idle seconds before a keep-alive comment is written to a stream.
    pub keepalive_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            history_limit: DEFAULT_HISTORY_LIMIT,
            blocked_words: vec!["fuck".to_string()],
            timestamps: false,
            keepalive_secs: 15,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unset or unparsable values fall back to
    /// [`Config::default`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_var("PORT", defaults.port),
            outbox_capacity: parsed_var("OUTBOX_CAPACITY", defaults.outbox_capacity)
                .max(MIN_OUTBOX_CAPACITY),
            history_limit: parsed_var("HISTORY_LIMIT", defaults.history_limit),
            blocked_words: std::env::var("BLOCKED_WORDS")
                .ok()
                .map(|v| parse_word_list(&v))
                .unwrap_or(defaults.blocked_words),
            timestamps: parsed_var("CHAT_TIMESTAMPS", defaults.timestamps),
            keepalive_secs: parsed_var("KEEPALIVE_SECS", defaults.keepalive_secs).max(1),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            announcer: AnnouncerConfig {
                outbox_capacity: self.outbox_capacity,
                history_limit: self.history_limit,
            },
            blocked_words: self.blocked_words.clone(),
            timestamps: self.timestamps,
        }
    }
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "unparsable value, using default");
            default
        }),
        _ => default,
    }
}

/// Comma-separated list; blank entries are dropped, so `BLOCKED_WORDS=`
/// disables the filter.
fn parse_word_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}
