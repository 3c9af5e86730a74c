//! Display-name rules shared by the connect path and the `!username` command.

/// Maximum display-name length, in characters.
pub const MAX_USERNAME_LEN: usize = 12;

/// Prefix of server-generated names.
pub const GUEST_PREFIX: &str = "Guest";

/// Whether `name` is a usable display name: 1..=12 characters, no whitespace.
pub fn is_valid_username(name: &str) -> bool {
    let len = name.chars().count();
    (1..=MAX_USERNAME_LEN).contains(&len) && !name.chars().any(char::is_whitespace)
}

/// Format the `n`th guest name (`Guest001`, `Guest002`, ...).
pub fn guest_name(n: u32) -> String {
    format!("{GUEST_PREFIX}{n:03}")
}

/// Pick the lowest-numbered guest name not present in `taken`.
pub fn allocate_guest_name<S: AsRef<str>>(taken: &[S]) -> String {
    (1..)
        .map(guest_name)
        .find(|candidate| !taken.iter().any(|t| t.as_ref() == candidate))
        .unwrap_or_else(|| guest_name(0))
}
