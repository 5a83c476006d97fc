use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = relay_common::id::prefixed_ulid("ses");
/// assert!(id.starts_with("ses_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// A fresh connection/session identifier.
pub fn session_id() -> String {
    prefixed_ulid(prefix::SESSION)
}

/// A fresh identifier for an outbound event.
pub fn event_id() -> String {
    prefixed_ulid(prefix::EVENT)
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const SESSION: &str = "ses";
    pub const EVENT: &str = "evt";
}
