//! Event names and the SSE record framer.
//!
//! Every record a listener receives goes through [`FramedMessage::encode`], so
//! broadcasts, unicasts and command replies share one byte format:
//!
//! ```text
//! event: <name>\n        (optional)
//! data: <line>\n         (one per line)
//! \n
//! ```

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use super::error::GatewayError;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names sent to clients. Records without an event name are plain chat
/// lines and are the only ones kept in history.
pub struct EventName;

impl EventName {
    pub const USER_LIST: &'static str = "userlist";
    pub const NEW_USERNAME: &'static str = "newUsername";
    pub const CONNECTED: &'static str = "connected";
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    SingleLine(String),
    MultiLine(Vec<String>),
}

impl Payload {
    pub fn lines(&self) -> &[String] {
        match self {
            Payload::SingleLine(line) => std::slice::from_ref(line),
            Payload::MultiLine(lines) => lines,
        }
    }

    /// True when no line carries any text.
    pub fn is_empty(&self) -> bool {
        self.lines().iter().all(|line| line.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Framed message
// ---------------------------------------------------------------------------

/// One SSE record. Lines never contain `\n` or `\r`; the constructors enforce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedMessage {
    event: Option<String>,
    payload: Payload,
    user: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

/// Build a record from structured content.
///
/// Fails with [`GatewayError::InvalidPayload`] when `lines` is empty or any
/// line, the event name or the user would break the framing.
pub fn frame(
    event: Option<&str>,
    mut lines: Vec<String>,
    user: Option<&str>,
    include_timestamp: bool,
) -> Result<FramedMessage, GatewayError> {
    if let Some(name) = event {
        if name.is_empty() || has_line_break(name) {
            return Err(GatewayError::InvalidPayload(format!(
                "event name {name:?} is not a single token"
            )));
        }
    }
    if let Some(user) = user {
        if has_line_break(user) {
            return Err(GatewayError::InvalidPayload(format!(
                "user {user:?} contains a line break"
            )));
        }
    }
    if let Some(idx) = lines.iter().position(|line| has_line_break(line)) {
        return Err(GatewayError::InvalidPayload(format!(
            "line {idx} contains a line break"
        )));
    }

    let payload = match lines.len() {
        0 => return Err(GatewayError::InvalidPayload("no lines to send".to_string())),
        1 => Payload::SingleLine(lines.remove(0)),
        _ => Payload::MultiLine(lines),
    };

    Ok(FramedMessage {
        event: event.map(str::to_string),
        payload,
        user: user.map(str::to_string),
        timestamp: include_timestamp.then(Utc::now),
    })
}

impl FramedMessage {
    /// A plain server-generated chat line. Stray line breaks become spaces.
    pub fn notice(text: impl AsRef<str>) -> Self {
        Self {
            event: None,
            payload: Payload::SingleLine(sanitize(text.as_ref())),
            user: None,
            timestamp: None,
        }
    }

    /// A plain server-generated multi-line message.
    pub fn notice_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            event: None,
            payload: sanitized_payload(lines),
            user: None,
            timestamp: None,
        }
    }

    /// A named event. An empty line list is sent as a single empty data line.
    pub fn event<I, S>(name: &'static str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            event: Some(name.to_string()),
            payload: sanitized_payload(lines),
            user: None,
            timestamp: None,
        }
    }

    /// Replace the timestamp, mostly useful for deterministic rendering.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn event_name(&self) -> Option<&str> {
        self.event.as_deref()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Chat content (no event name) as opposed to control events.
    pub fn is_chat(&self) -> bool {
        self.event.is_none()
    }

    /// The data lines as the client will display them. The first line carries
    /// the `[HH:MM] ` and `<user>: ` prefixes when present.
    pub fn lines(&self) -> Vec<String> {
        let mut prefix = String::new();
        if let Some(ts) = self.timestamp {
            let _ = write!(prefix, "[{}] ", ts.format("%H:%M"));
        }
        if let Some(user) = &self.user {
            let _ = write!(prefix, "{user}: ");
        }

        self.payload
            .lines()
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                if idx == 0 {
                    format!("{prefix}{line}")
                } else {
                    line.clone()
                }
            })
            .collect()
    }

    /// Encode the record in SSE wire format.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if let Some(event) = &self.event {
            out.push_str("event: ");
            out.push_str(event);
            out.push('\n');
        }
        for line in self.lines() {
            out.push_str("data: ");
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\n', '\r'])
}

fn sanitize(s: &str) -> String {
    s.replace(['\n', '\r'], " ")
}

fn sanitized_payload<I, S>(lines: I) -> Payload
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut lines: Vec<String> = lines.into_iter().map(|l| sanitize(l.as_ref())).collect();
    match lines.len() {
        0 => Payload::SingleLine(String::new()),
        1 => Payload::SingleLine(lines.remove(0)),
        _ => Payload::MultiLine(lines),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn strings(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_line_chat_record() {
        let msg = frame(None, strings(&["hello"]), None, false).unwrap();
        assert_eq!(msg.encode(), "data: hello\n\n");
        assert!(msg.is_chat());
        assert_eq!(msg.payload(), &Payload::SingleLine("hello".to_string()));
    }

    #[test]
    fn multi_line_event_record_keeps_line_order() {
        let msg = frame(Some(EventName::USER_LIST), strings(&["alice", "bob"]), None, false).unwrap();
        assert_eq!(msg.encode(), "event: userlist\ndata: alice\ndata: bob\n\n");
        assert!(!msg.is_chat());
    }

    #[test]
    fn user_prefix_only_on_first_line() {
        let msg = frame(None, strings(&["first", "second"]), Some("alice"), false).unwrap();
        assert_eq!(msg.encode(), "data: alice: first\ndata: second\n\n");
    }

    #[test]
    fn timestamp_prefix_precedes_user() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 9, 7, 30).unwrap();
        let msg = frame(None, strings(&["hi"]), Some("bob"), false)
            .unwrap()
            .with_timestamp(ts);
        assert_eq!(msg.encode(), "data: [09:07] bob: hi\n\n");
    }

    #[test]
    fn include_timestamp_sets_timestamp() {
        let msg = frame(None, strings(&["hi"]), None, true).unwrap();
        assert!(msg.timestamp().is_some());
        let msg = frame(None, strings(&["hi"]), None, false).unwrap();
        assert!(msg.timestamp().is_none());
    }

    #[test]
    fn rejects_embedded_line_breaks() {
        let err = frame(None, strings(&["ok", "bad\n\nline"]), None, false).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidPayload(_)));

        let err = frame(None, strings(&["carriage\rreturn"]), None, false).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidPayload(_)));

        let err = frame(Some("two\nwords"), strings(&["x"]), None, false).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_empty_line_list() {
        let err = frame(None, Vec::new(), None, false).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidPayload(_)));
    }

    #[test]
    fn notice_folds_line_breaks() {
        let msg = FramedMessage::notice("a\nb\r\nc");
        assert_eq!(msg.encode(), "data: a b  c\n\n");
    }

    #[test]
    fn empty_event_sends_one_blank_data_line() {
        let msg = FramedMessage::event(EventName::CONNECTED, Vec::<String>::new());
        assert_eq!(msg.encode(), "event: connected\ndata: \n\n");
        assert!(msg.payload().is_empty());
    }

    #[test]
    fn encoded_records_end_with_exactly_one_blank_line() {
        let msg = FramedMessage::notice_lines(["one", "two", "three"]);
        let encoded = msg.encode();
        assert!(encoded.ends_with("\n\n"));
        assert!(!encoded.trim_end_matches('\n').contains("\n\n"));
        assert_eq!(encoded.matches("data: ").count(), 3);
    }
}
