use ulid::Ulid;

/// Longest listener id the server accepts.
pub const MAX_LISTENER_ID_LEN: usize = 64;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = chat_common::id::prefixed_ulid("lst");
/// assert!(id.starts_with("lst_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Marker trait for types that represent a prefixed ID.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const LISTENER: &str = "lst";
}

/// Identity of a stream listener, issued by `GET /session` or chosen by the client.
pub struct ListenerId;

impl PrefixedId for ListenerId {
    const PREFIX: &'static str = prefix::LISTENER;
}

/// Whether `id` is acceptable as a listener id.
///
/// Clients may bring their own ids (older clients store a UUID), so this only
/// checks the shape: 1..=64 ASCII alphanumerics, `-` or `_`.
pub fn is_valid_listener_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_LISTENER_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
