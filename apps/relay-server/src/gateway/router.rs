//! Client action dispatch.
//!
//! Every handler runs to completion for a single inbound event and never ends
//! the session: client mistakes become `error` replies, upstream failures are
//! logged. Only the read loop decides when a connection is over.

use std::sync::Arc;

use relay_common::{EventName, OutboundEvent};
use serde_json::{json, Value};

use crate::error::RelayError;
use crate::logging;
use crate::upstream::AuthOutcome;

use super::events::{ClientAction, InboundEvent};
use super::relay::{connection_lost_leave, RelayServer};
use super::session::Session;

/// Handle one inbound event from `session`.
pub async fn route(relay: &RelayServer, session: &Arc<Session>, inbound: InboundEvent) {
    logging::message_received(&session.id, &session.username(), inbound.action());

    let result = match ClientAction::parse(&inbound) {
        Ok(action) => dispatch(relay, session, action).await,
        Err(err) => Err(err),
    };

    if let Err(err) = result {
        report(session, &err).await;
    }
}

async fn dispatch(
    relay: &RelayServer,
    session: &Arc<Session>,
    action: ClientAction,
) -> Result<(), RelayError> {
    match action {
        ClientAction::Authenticate { token } => handle_authenticate(relay, session, &token).await,
        ClientAction::JoinChannel {
            channel,
            private,
            data,
        } => handle_join_channel(relay, session, &channel, private, data).await,
        ClientAction::LeaveChannel { channel, data } => {
            handle_leave_channel(relay, session, &channel, data).await
        }
        ClientAction::SendMessage {
            channel,
            event,
            data,
        } => handle_send_message(relay, session, &channel, &event, data).await,
        ClientAction::Ping => handle_ping(session).await,
        ClientAction::Generic {
            action,
            channel,
            data,
        } => handle_generic(relay, session, &action, &channel, data).await,
    }
}

/// Send client-visible errors as an `error` event; log the rest.
async fn report(session: &Session, err: &RelayError) {
    match err.client_message() {
        Some(message) => {
            tracing::debug!(session_id = %session.id, error = %err, "rejecting client action");
            reply(session, OutboundEvent::error(message)).await;
        }
        None => {
            tracing::error!(session_id = %session.id, error = %err, "client action failed");
        }
    }
}

async fn reply(session: &Session, event: OutboundEvent) {
    if let Err(err) = session.send(&event).await {
        tracing::debug!(session_id = %session.id, event = %event.event, error = %err, "reply not delivered");
    }
}

// ---------------------------------------------------------------------------
// authenticate
// ---------------------------------------------------------------------------

pub async fn handle_authenticate(
    relay: &RelayServer,
    session: &Session,
    token: &str,
) -> Result<(), RelayError> {
    let validator = relay.validator();

    let outcome = match validator.validate_token(token) {
        Ok(claims) => {
            let user = validator.extract_user_info(&claims);
            session.set_identity(&user.user_id, &user.username, &user.email);
            logging::client_authenticated(&session.id, &user.username, &user.user_id);
            AuthOutcome::Success
        }
        Err(err) => {
            logging::client_authentication_failed(&session.id, &err);
            report(session, &err).await;
            AuthOutcome::Failed
        }
    };

    if let Err(err) = relay
        .upstream()
        .dispatch_authentication(&session.client_info(), outcome, token)
        .await
    {
        tracing::error!(session_id = %session.id, ?outcome, error = %err, "authentication audit dispatch failed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// join_channel
// ---------------------------------------------------------------------------

/// Join is gated on the upstream: the subscription only happens after the
/// upstream accepted the `join_channel` dispatch.
pub async fn handle_join_channel(
    relay: &RelayServer,
    session: &Arc<Session>,
    name: &str,
    private: bool,
    data: Option<Value>,
) -> Result<(), RelayError> {
    let channel = relay.channels().get_or_create(name, private);

    if channel.require_auth && !session.is_authenticated() {
        tracing::warn!(session_id = %session.id, channel = %name, "join denied: authentication required");
        return Err(RelayError::Authorization);
    }

    let identity = session.identity();
    let event = OutboundEvent::new(EventName::JOIN_CHANNEL)
        .with_channel(name)
        .with_data(data.clone())
        .with_private(private)
        .from_user(identity.user_id.clone(), identity.username.clone());

    relay
        .upstream()
        .dispatch_message(&event, &session.client_info())
        .await?;

    channel.add_subscriber(session);
    if !session.add_membership(name, data.clone()) {
        // Teardown started while the upstream was deciding and has already
        // swept this session's channels. Undo the join here instead.
        channel.remove_subscriber(&session.id);
        tracing::debug!(session_id = %session.id, channel = %name, "join approved after disconnect; rolling back");

        let leave = connection_lost_leave(session, &identity, name, data);
        if let Err(err) = relay
            .upstream()
            .dispatch_message(&leave, &session.client_info())
            .await
        {
            tracing::error!(session_id = %session.id, channel = %name, error = %err, "rollback leave_channel dispatch failed");
        }
        return Ok(());
    }
    logging::channel_joined(&session.id, &identity.username, name);

    reply(session, OutboundEvent::joined_channel(name)).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// leave_channel
// ---------------------------------------------------------------------------

/// Leave always takes local effect; the upstream is only informed.
pub async fn handle_leave_channel(
    relay: &RelayServer,
    session: &Session,
    name: &str,
    data: Option<Value>,
) -> Result<(), RelayError> {
    let channel = relay
        .channels()
        .lookup(name)
        .ok_or_else(|| RelayError::ChannelNotFound(name.to_string()))?;

    let stored = session.get_membership(name).and_then(|m| m.data);
    channel.remove_subscriber(&session.id);
    session.remove_membership(name);

    let identity = session.identity();
    logging::channel_left(&session.id, &identity.username, name);

    let payload = stored.or(data).unwrap_or_else(|| {
        json!({
            "channel": name,
            "client_id": session.id,
            "user_id": identity.user_id,
            "username": identity.username,
        })
    });

    let event = OutboundEvent::new(EventName::LEAVE_CHANNEL)
        .with_channel(name)
        .with_data(Some(payload))
        .from_user(identity.user_id, identity.username);

    if let Err(err) = relay
        .upstream()
        .dispatch_message(&event, &session.client_info())
        .await
    {
        tracing::error!(session_id = %session.id, channel = %name, error = %err, "leave_channel dispatch failed");
    }

    reply(session, OutboundEvent::left_channel(name)).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// send_message
// ---------------------------------------------------------------------------

/// Forward upstream, then broadcast to the channel whatever the upstream said.
pub async fn handle_send_message(
    relay: &RelayServer,
    session: &Session,
    channel: &str,
    event_name: &str,
    data: Option<Value>,
) -> Result<(), RelayError> {
    let identity = session.identity();
    logging::message_sent(&session.id, &identity.username, channel, event_name, data.as_ref());

    let event = OutboundEvent::new(event_name)
        .with_channel(channel)
        .with_data(data)
        .from_user(identity.user_id, identity.username);

    if let Err(err) = relay
        .upstream()
        .dispatch_message(&event, &session.client_info())
        .await
    {
        tracing::error!(session_id = %session.id, %channel, error = %err, "message dispatch failed");
    }

    relay.broadcast_to_channel(channel, &event).await;
    Ok(())
}

// ---------------------------------------------------------------------------
// ping / generic
// ---------------------------------------------------------------------------

pub async fn handle_ping(session: &Session) -> Result<(), RelayError> {
    tracing::debug!(session_id = %session.id, "ping action");
    reply(session, OutboundEvent::pong()).await;
    Ok(())
}

/// Unrecognized actions are application messages for the upstream.
///
/// A bare `ping` (no channel, no data) reaching this path is answered locally
/// and not forwarded.
pub async fn handle_generic(
    relay: &RelayServer,
    session: &Session,
    action: &str,
    channel: &str,
    data: Option<Value>,
) -> Result<(), RelayError> {
    if action == EventName::PING && channel.is_empty() && data.is_none() {
        tracing::debug!(session_id = %session.id, "answering bare ping locally");
        reply(session, OutboundEvent::pong()).await;
        return Ok(());
    }

    let identity = session.identity();
    let event = OutboundEvent::new(action)
        .with_channel(channel)
        .with_data(data)
        .from_user(identity.user_id, identity.username);

    tracing::debug!(session_id = %session.id, %action, "forwarding application message upstream");
    relay
        .upstream()
        .dispatch_message(&event, &session.client_info())
        .await
}
