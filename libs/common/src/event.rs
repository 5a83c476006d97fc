//! Wire-format events sent from the relay to clients and to the upstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names produced by the relay itself.
pub struct EventName;

impl EventName {
    pub const AUTHENTICATE: &'static str = "authenticate";
    pub const JOIN_CHANNEL: &'static str = "join_channel";
    pub const JOINED_CHANNEL: &'static str = "joined_channel";
    pub const LEAVE_CHANNEL: &'static str = "leave_channel";
    pub const LEFT_CHANNEL: &'static str = "left_channel";
    pub const SEND_MESSAGE: &'static str = "send_message";
    pub const MESSAGE: &'static str = "message";
    pub const PING: &'static str = "ping";
    pub const PONG: &'static str = "pong";
    pub const ERROR: &'static str = "error";
}

// ---------------------------------------------------------------------------
// Server → Client event
// ---------------------------------------------------------------------------

/// A single routed event.
///
/// Built once and never mutated afterwards; broadcast clones it per recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub id: String,
    pub event: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Only present on `join_channel` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    pub timestamp: DateTime<Utc>,
}

impl OutboundEvent {
    /// A system event with a fresh id and the current timestamp.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            id: id::event_id(),
            event: event.into(),
            channel: String::new(),
            data: None,
            private: None,
            user_id: String::new(),
            username: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.private = Some(private);
        self
    }

    /// Attribute the event to a user (empty strings for anonymous sessions).
    pub fn from_user(mut self, user_id: impl Into<String>, username: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self.username = username.into();
        self
    }

    pub fn pong() -> Self {
        Self::new(EventName::PONG)
    }

    /// Client-visible error: `{"error": message}`.
    pub fn error(message: &str) -> Self {
        Self::new(EventName::ERROR).with_data(Some(serde_json::json!({ "error": message })))
    }

    pub fn joined_channel(channel: &str) -> Self {
        Self::new(EventName::JOINED_CHANNEL)
            .with_data(Some(serde_json::json!({ "channel": channel })))
    }

    pub fn left_channel(channel: &str) -> Self {
        Self::new(EventName::LEFT_CHANNEL)
            .with_data(Some(serde_json::json!({ "channel": channel })))
    }
}
