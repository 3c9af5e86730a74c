//! Entry points called by the HTTP layer: client messages, stream opens and
//! stream closes.

use chat_common::username::{allocate_guest_name, is_valid_username};
use serde::Serialize;
use utoipa::ToSchema;

use super::announcer::{Announcer, AnnouncerConfig};
use super::commands::{self, Command};
use super::error::GatewayError;
use super::events::{frame, EventName, FramedMessage};
use super::history::ChatHistory;
use super::listener::Outbox;
use super::moderation::{WordFilter, SWEAR_WARNING};

/// Sent to every new listener after the history replay.
pub const HELP_HINT: &str = "Server: Type !help for a list of commands.";

/// Name a client sends when it has nothing stored.
const NO_STORED_NAME: &str = "null";

/// What happened to an accepted client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageOutcome {
    /// Broadcast as chat.
    Delivered,
    /// Hit the word filter; the sender got a private warning instead.
    Filtered,
    /// Interpreted as a command.
    Command,
}

/// A freshly opened stream. The caller drains `outbox` into the transport and
/// calls [`Dispatcher::on_client_disconnect`] with `session` when it closes.
pub struct Connection {
    pub listener_id: String,
    pub display_name: String,
    pub session: u64,
    pub outbox: Outbox,
}

/// Options that shape dispatch beyond the announcer itself.
#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    pub announcer: AnnouncerConfig,
    pub blocked_words: Vec<String>,
    /// Stamp chat lines with `[HH:MM]`.
    pub timestamps: bool,
}

pub struct Dispatcher {
    announcer: Announcer,
    filter: WordFilter,
    timestamps: bool,
}

impl Dispatcher {
    pub fn new(cfg: DispatchConfig) -> Self {
        Self {
            announcer: Announcer::new(cfg.announcer),
            filter: WordFilter::new(cfg.blocked_words),
            timestamps: cfg.timestamps,
        }
    }

    pub fn announcer(&self) -> &Announcer {
        &self.announcer
    }

    /// Handle a message posted by `listener_id`.
    pub fn on_client_message(
        &self,
        listener_id: &str,
        raw: &str,
    ) -> Result<MessageOutcome, GatewayError> {
        let name = self
            .announcer
            .display_name(listener_id)
            .ok_or_else(|| GatewayError::UnknownListener(listener_id.to_string()))?;

        if raw.trim().is_empty() {
            return Err(GatewayError::EmptyPayload);
        }

        if self.filter.is_blocked(raw) {
            tracing::info!(listener_id = %listener_id, "message blocked by word filter");
            self.announcer
                .unicast(listener_id, FramedMessage::notice(SWEAR_WARNING))?;
            return Ok(MessageOutcome::Filtered);
        }

        if let Some(command) = Command::parse(raw) {
            commands::execute(&self.announcer, listener_id, command)?;
            return Ok(MessageOutcome::Command);
        }

        let lines: Vec<String> = raw
            .trim_matches(|c: char| c == '\n' || c == '\r')
            .lines()
            .map(|line| line.replace('\r', ""))
            .collect();
        let message = frame(None, lines, Some(&name), self.timestamps)?;
        tracing::debug!(listener_id = %listener_id, user = %name, "broadcasting chat message");
        self.announcer.broadcast(message)?;
        Ok(MessageOutcome::Delivered)
    }

    /// Open a stream for `listener_id`.
    ///
    /// `supplied_name` is what the client had stored; `None`, `"null"` or an
    /// invalid name gets the next free guest name instead. The new listener
    /// receives, in order: the user list, its name, the chat history and a
    /// help hint. All four are queued before anything else can reach it.
    pub fn on_client_connect(
        &self,
        listener_id: &str,
        supplied_name: Option<&str>,
    ) -> Result<Connection, GatewayError> {
        let display_name = match supplied_name {
            Some(name) if name != NO_STORED_NAME && is_valid_username(name) => name.to_string(),
            _ => allocate_guest_name(&self.announcer.user_list()),
        };

        self.announcer.broadcast(FramedMessage::notice(format!(
            "{display_name} has joined the chat"
        )))?;

        let limit = self.announcer.config().history_limit;
        let subscription = self.announcer.join(listener_id, &display_name, |history| {
            vec![
                FramedMessage::event(EventName::NEW_USERNAME, [display_name.as_str()]),
                history_replay(history, limit),
                FramedMessage::notice(HELP_HINT),
            ]
        })?;

        Ok(Connection {
            listener_id: listener_id.to_string(),
            display_name,
            session: subscription.session,
            outbox: subscription.outbox,
        })
    }

    /// Close a stream. See [`Announcer::disconnect`].
    pub fn on_client_disconnect(&self, listener_id: &str, session: Option<u64>) -> bool {
        self.announcer.disconnect(listener_id, session)
    }
}

/// The `connected` event: the last `limit` chat records, one data line each.
fn history_replay(history: &ChatHistory, limit: usize) -> FramedMessage {
    let lines: Vec<String> = history
        .recent(limit)
        .iter()
        .flat_map(|m| m.lines())
        .collect();
    FramedMessage::event(EventName::CONNECTED, lines)
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::listener::DEFAULT_OUTBOX_CAPACITY;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(DispatchConfig {
            announcer: AnnouncerConfig {
                outbox_capacity: 16,
                history_limit: 100,
            },
            blocked_words: vec!["darn".to_string()],
            timestamps: false,
        })
    }

    fn drain(outbox: &mut Outbox) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = outbox.try_recv() {
            out.push(msg.encode());
        }
        out
    }

    #[test]
    fn connect_sends_userlist_name_history_and_hint() {
        let d = dispatcher();
        let mut conn = d.on_client_connect("a", Some("alice")).unwrap();

        assert_eq!(conn.display_name, "alice");
        assert_eq!(
            drain(&mut conn.outbox),
            vec![
                "event: userlist\ndata: alice\n\n".to_string(),
                "event: newUsername\ndata: alice\n\n".to_string(),
                "event: connected\ndata: alice has joined the chat\n\n".to_string(),
                format!("data: {HELP_HINT}\n\n"),
            ]
        );
    }

    #[test]
    fn connect_without_name_allocates_sequential_guests() {
        let d = dispatcher();
        let first = d.on_client_connect("a", Some("null")).unwrap();
        let second = d.on_client_connect("b", None).unwrap();
        let third = d.on_client_connect("c", Some("has spaces")).unwrap();

        assert_eq!(first.display_name, "Guest001");
        assert_eq!(second.display_name, "Guest002");
        assert_eq!(third.display_name, "Guest003");
    }

    #[test]
    fn connect_replays_earlier_chat() {
        let d = dispatcher();
        let _alice = d.on_client_connect("a", Some("alice")).unwrap();
        d.on_client_message("a", "first").unwrap();
        d.on_client_message("a", "second").unwrap();

        let mut bob = d.on_client_connect("b", Some("bob")).unwrap();
        let replay = drain(&mut bob.outbox)
            .into_iter()
            .find(|r| r.starts_with("event: connected\n"))
            .unwrap();
        assert_eq!(
            replay,
            "event: connected\n\
             data: alice has joined the chat\n\
             data: alice: first\n\
             data: alice: second\n\
             data: bob has joined the chat\n\n"
        );
    }

    #[test]
    fn others_see_the_join_notice() {
        let d = dispatcher();
        let mut alice = d.on_client_connect("a", Some("alice")).unwrap();
        drain(&mut alice.outbox);

        let _bob = d.on_client_connect("b", Some("bob")).unwrap();
        assert_eq!(
            drain(&mut alice.outbox),
            vec![
                "data: bob has joined the chat\n\n".to_string(),
                "event: userlist\ndata: alice\ndata: bob\n\n".to_string(),
            ]
        );
    }

    #[test]
    fn message_from_unknown_listener_is_rejected() {
        let d = dispatcher();
        assert_eq!(
            d.on_client_message("ghost", "hi"),
            Err(GatewayError::UnknownListener("ghost".to_string()))
        );
    }

    #[test]
    fn blank_message_is_rejected() {
        let d = dispatcher();
        let _alice = d.on_client_connect("a", Some("alice")).unwrap();
        assert_eq!(d.on_client_message("a", "  \n "), Err(GatewayError::EmptyPayload));
    }

    #[test]
    fn chat_message_is_broadcast_with_sender_name() {
        let d = dispatcher();
        let mut alice = d.on_client_connect("a", Some("alice")).unwrap();
        let mut bob = d.on_client_connect("b", Some("bob")).unwrap();
        drain(&mut alice.outbox);
        drain(&mut bob.outbox);

        assert_eq!(d.on_client_message("a", "hello"), Ok(MessageOutcome::Delivered));
        assert_eq!(drain(&mut alice.outbox), vec!["data: alice: hello\n\n"]);
        assert_eq!(drain(&mut bob.outbox), vec!["data: alice: hello\n\n"]);
    }

    #[test]
    fn multi_line_message_becomes_one_record() {
        let d = dispatcher();
        let mut alice = d.on_client_connect("a", Some("alice")).unwrap();
        drain(&mut alice.outbox);

        d.on_client_message("a", "line one\r\nline two\n").unwrap();
        assert_eq!(
            drain(&mut alice.outbox),
            vec!["data: alice: line one\ndata: line two\n\n"]
        );
    }

    #[test]
    fn blocked_word_warns_sender_only() {
        let d = dispatcher();
        let mut alice = d.on_client_connect("a", Some("alice")).unwrap();
        let mut bob = d.on_client_connect("b", Some("bob")).unwrap();
        drain(&mut alice.outbox);
        drain(&mut bob.outbox);
        let history_before = d.announcer().recent_history(100).len();

        assert_eq!(d.on_client_message("a", "oh DARN"), Ok(MessageOutcome::Filtered));
        assert_eq!(drain(&mut alice.outbox), vec![format!("data: {SWEAR_WARNING}\n\n")]);
        assert!(drain(&mut bob.outbox).is_empty());
        assert_eq!(d.announcer().recent_history(100).len(), history_before);
    }

    #[test]
    fn commands_are_not_broadcast() {
        let d = dispatcher();
        let mut alice = d.on_client_connect("a", Some("alice")).unwrap();
        drain(&mut alice.outbox);

        assert_eq!(d.on_client_message("a", "!whoami"), Ok(MessageOutcome::Command));
        assert_eq!(drain(&mut alice.outbox), vec!["data: Server: You are alice\n\n"]);
    }

    #[test]
    fn connect_succeeds_at_every_small_capacity() {
        for capacity in 1..=DEFAULT_OUTBOX_CAPACITY {
            let d = Dispatcher::new(DispatchConfig {
                announcer: AnnouncerConfig {
                    outbox_capacity: capacity,
                    history_limit: 100,
                },
                ..DispatchConfig::default()
            });

            let mut alice = d
                .on_client_connect("a", Some("alice"))
                .unwrap_or_else(|e| panic!("capacity {capacity}: {e}"));

            assert!(d.announcer().contains("a"), "capacity {capacity}");
            assert_eq!(drain(&mut alice.outbox).len(), 4, "capacity {capacity}");
            let history: Vec<String> = d
                .announcer()
                .recent_history(100)
                .iter()
                .flat_map(|m| m.lines())
                .collect();
            assert_eq!(history, vec!["alice has joined the chat"], "capacity {capacity}");
        }
    }

    #[test]
    fn disconnect_removes_listener() {
        let d = dispatcher();
        let alice = d.on_client_connect("a", Some("alice")).unwrap();
        assert!(d.on_client_disconnect("a", Some(alice.session)));
        assert!(d.announcer().user_list().is_empty());
    }
}
