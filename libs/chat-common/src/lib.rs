pub mod id;
pub mod username;

pub use id::{ListenerId, PrefixedId};
