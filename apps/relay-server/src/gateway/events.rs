//! Client → server wire format and its validation into typed actions.

use relay_common::EventName;
use serde_json::{Map, Value};

use crate::error::RelayError;

// ---------------------------------------------------------------------------
// Raw inbound event
// ---------------------------------------------------------------------------

/// A decoded but unvalidated client message: any JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundEvent(Map<String, Value>);

impl InboundEvent {
    /// Decode a frame payload. Anything other than a JSON object is a protocol error.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RelayError> {
        serde_json::from_slice::<Map<String, Value>>(bytes)
            .map(Self)
            .map_err(|e| RelayError::Protocol(e.to_string()))
    }

    /// The action name, or `"unknown"` when missing or not a string.
    pub fn action(&self) -> &str {
        self.str_field("action").unwrap_or("unknown")
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn bool_field(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// The opaque `data` payload. JSON `null` counts as absent.
    pub fn data(&self) -> Option<Value> {
        self.0.get("data").filter(|v| !v.is_null()).cloned()
    }
}

impl From<Value> for InboundEvent {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    Authenticate {
        token: String,
    },
    JoinChannel {
        channel: String,
        private: bool,
        data: Option<Value>,
    },
    LeaveChannel {
        channel: String,
        data: Option<Value>,
    },
    SendMessage {
        channel: String,
        event: String,
        data: Option<Value>,
    },
    Ping,
    /// Anything else; forwarded upstream as an application message.
    Generic {
        action: String,
        channel: String,
        data: Option<Value>,
    },
}

impl ClientAction {
    /// Validate an inbound event into an action.
    ///
    /// A `ping` that names a channel is an application event, not a liveness
    /// check, and takes the generic path.
    pub fn parse(event: &InboundEvent) -> Result<Self, RelayError> {
        let action = match event.str_field("action") {
            Some(EventName::AUTHENTICATE) => Self::Authenticate {
                token: event
                    .str_field("token")
                    .ok_or(RelayError::InvalidRequest("Invalid token format"))?
                    .to_string(),
            },
            Some(EventName::JOIN_CHANNEL) => Self::JoinChannel {
                channel: required_channel(event)?,
                private: event.bool_field("private").unwrap_or(false),
                data: event.data(),
            },
            Some(EventName::LEAVE_CHANNEL) => Self::LeaveChannel {
                channel: required_channel(event)?,
                data: event.data(),
            },
            Some(EventName::SEND_MESSAGE) => Self::SendMessage {
                channel: required_channel(event)?,
                event: event
                    .str_field("event")
                    .unwrap_or(EventName::MESSAGE)
                    .to_string(),
                data: event.data(),
            },
            Some(EventName::PING) if event.str_field("channel").unwrap_or("").is_empty() => {
                Self::Ping
            }
            _ => Self::Generic {
                action: event.action().to_string(),
                channel: event.str_field("channel").unwrap_or("").to_string(),
                data: event.data(),
            },
        };
        Ok(action)
    }
}

fn required_channel(event: &InboundEvent) -> Result<String, RelayError> {
    event
        .str_field("channel")
        .map(String::from)
        .ok_or(RelayError::InvalidRequest("Invalid channel name"))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: Value) -> Result<ClientAction, RelayError> {
        ClientAction::parse(&InboundEvent::from(value))
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert!(matches!(
            InboundEvent::from_slice(b"[1,2,3]"),
            Err(RelayError::Protocol(_))
        ));
        assert!(matches!(
            InboundEvent::from_slice(b"{not json"),
            Err(RelayError::Protocol(_))
        ));
        assert!(InboundEvent::from_slice(b"{}").is_ok());
    }

    #[test]
    fn join_defaults_to_public() {
        let action = parse(json!({"action": "join_channel", "channel": "lobby"})).unwrap();
        assert_eq!(
            action,
            ClientAction::JoinChannel {
                channel: "lobby".into(),
                private: false,
                data: None,
            }
        );
    }

    #[test]
    fn wrong_typed_private_flag_falls_back_to_default() {
        let action =
            parse(json!({"action": "join_channel", "channel": "c", "private": "yes"})).unwrap();
        assert!(matches!(action, ClientAction::JoinChannel { private: false, .. }));
    }

    #[test]
    fn missing_channel_is_invalid() {
        let err = parse(json!({"action": "leave_channel", "channel": 42})).unwrap_err();
        assert_eq!(err.client_message(), Some("Invalid channel name"));
    }

    #[test]
    fn non_string_token_is_invalid() {
        let err = parse(json!({"action": "authenticate", "token": 7})).unwrap_err();
        assert_eq!(err.client_message(), Some("Invalid token format"));
    }

    #[test]
    fn send_message_event_defaults_to_message() {
        let action = parse(json!({"action": "send_message", "channel": "c", "data": "hi"})).unwrap();
        assert_eq!(
            action,
            ClientAction::SendMessage {
                channel: "c".into(),
                event: "message".into(),
                data: Some(json!("hi")),
            }
        );
    }

    #[test]
    fn ping_with_channel_takes_generic_path() {
        assert_eq!(parse(json!({"action": "ping"})).unwrap(), ClientAction::Ping);
        assert_eq!(
            parse(json!({"action": "ping", "channel": "x"})).unwrap(),
            ClientAction::Generic {
                action: "ping".into(),
                channel: "x".into(),
                data: None,
            }
        );
    }

    #[test]
    fn missing_action_is_generic_unknown() {
        let action = parse(json!({"data": {"k": 1}})).unwrap();
        assert!(matches!(action, ClientAction::Generic { ref action, .. } if action == "unknown"));
    }

    #[test]
    fn null_data_is_absent() {
        let event = InboundEvent::from(json!({"action": "x", "data": null}));
        assert!(event.data().is_none());
    }
}
