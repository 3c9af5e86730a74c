//! In-band chat commands (`!help`, `!whoami`, `!username <name>`).
//!
//! Replies are unicast to the invoker. The one exception is a successful
//! rename, whose notice is broadcast because everyone in the room needs it.

use chat_common::username::{is_valid_username, MAX_USERNAME_LEN};

use super::announcer::Announcer;
use super::error::GatewayError;
use super::events::{EventName, FramedMessage};

/// Messages starting with this character are commands, never chat.
pub const COMMAND_MARKER: char = '!';

const HELP_LINES: [&str; 4] = [
    "Server: Available commands:",
    "!help - show this message",
    "!whoami - show your current username",
    "!username <name> - change your username",
];

/// A parsed command. Anything unrecognised, including a bare marker, is
/// `Unknown` so every input has a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Username { args: Vec<&'a str> },
    Help,
    Whoami,
    Unknown { token: &'a str },
}

impl<'a> Command<'a> {
    /// Parse `text` if it starts with [`COMMAND_MARKER`].
    ///
    /// The command token must follow the marker directly; `"! help"` is an
    /// unknown command with an empty token.
    pub fn parse(text: &'a str) -> Option<Self> {
        let rest = text.trim_end().strip_prefix(COMMAND_MARKER)?;
        let (token, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));

        Some(match token {
            "username" => Command::Username {
                args: args.split_whitespace().collect(),
            },
            "help" => Command::Help,
            "whoami" => Command::Whoami,
            _ => Command::Unknown { token },
        })
    }
}

/// Run `command` on behalf of `listener_id`.
pub fn execute(
    announcer: &Announcer,
    listener_id: &str,
    command: Command<'_>,
) -> Result<(), GatewayError> {
    tracing::debug!(listener_id = %listener_id, ?command, "executing command");

    match command {
        Command::Username { args } => change_username(announcer, listener_id, &args),
        Command::Help => announcer.unicast(listener_id, FramedMessage::notice_lines(HELP_LINES)),
        Command::Whoami => {
            let name = announcer
                .display_name(listener_id)
                .ok_or_else(|| GatewayError::UnknownListener(listener_id.to_string()))?;
            announcer.unicast(listener_id, FramedMessage::notice(format!("Server: You are {name}")))
        }
        Command::Unknown { token } => announcer.unicast(
            listener_id,
            FramedMessage::notice(format!(
                "Server: Unknown command \"{COMMAND_MARKER}{token}\". Try {COMMAND_MARKER}help"
            )),
        ),
    }
}

fn change_username(
    announcer: &Announcer,
    listener_id: &str,
    args: &[&str],
) -> Result<(), GatewayError> {
    let new_name = match args {
        [name] if is_valid_username(name) => *name,
        _ => return announcer.unicast(listener_id, username_usage()),
    };

    let previous = announcer.rename(listener_id, new_name)?;
    announcer.broadcast(FramedMessage::notice(format!(
        "{previous} changed name to {new_name}"
    )))?;
    announcer.refresh_user_list();

    // The rename has already been announced; an invoker evicted since then
    // simply misses its own confirmation.
    match announcer.unicast(
        listener_id,
        FramedMessage::event(EventName::NEW_USERNAME, [new_name]),
    ) {
        Err(GatewayError::UnknownListener(_)) => {
            tracing::debug!(listener_id = %listener_id, "renamed listener gone before confirmation");
            Ok(())
        }
        result => result,
    }
}

fn username_usage() -> FramedMessage {
    FramedMessage::notice_lines([
        "Server: Usage: !username <name>".to_string(),
        format!("Your username must be 1 to {MAX_USERNAME_LEN} characters long and may not contain spaces."),
        "Example: !username Guest666".to_string(),
    ])
}
