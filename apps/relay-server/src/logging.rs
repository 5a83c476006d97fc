//! Subscriber setup and the named connection-lifecycle log events.
//!
//! The event helpers are purely observational. Nothing in the gateway branches
//! on whether they ran.

use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::RelayError;

const DEFAULT_FILTER: &str = "info,tower_http=warn,hyper=warn";

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

pub fn client_connected(session_id: &str, remote_addr: &str, user_agent: &str) {
    tracing::info!(%session_id, %remote_addr, %user_agent, "client connected");
}

pub fn client_disconnected(session_id: &str, username: &str, remote_addr: &str) {
    tracing::info!(%session_id, %username, %remote_addr, "client disconnected");
}

pub fn client_authenticated(session_id: &str, username: &str, user_id: &str) {
    tracing::info!(%session_id, %username, %user_id, "client authenticated");
}

pub fn client_authentication_failed(session_id: &str, err: &RelayError) {
    tracing::warn!(%session_id, error = %err, "client authentication failed");
}

pub fn message_received(session_id: &str, username: &str, action: &str) {
    tracing::debug!(%session_id, %username, %action, "incoming message");
}

pub fn message_sent(session_id: &str, username: &str, channel: &str, event: &str, data: Option<&Value>) {
    tracing::info!(
        %session_id,
        %username,
        %channel,
        %event,
        has_data = data.is_some(),
        "message sent to channel"
    );
}

pub fn channel_joined(session_id: &str, username: &str, channel: &str) {
    tracing::info!(%session_id, %username, %channel, "joined channel");
}

pub fn channel_left(session_id: &str, username: &str, channel: &str) {
    tracing::info!(%session_id, %username, %channel, "left channel");
}

pub fn ping_sent(session_id: &str) {
    tracing::trace!(%session_id, "ping sent");
}

pub fn pong_received(session_id: &str) {
    tracing::debug!(%session_id, "pong received");
}

/// Why a session's read loop stopped, at a level matching how unusual it is.
pub fn read_terminated(session_id: &str, err: &RelayError) {
    match err {
        RelayError::ConnectionClosed => {
            tracing::info!(%session_id, "client connection closed");
        }
        RelayError::IdleTimeout => {
            tracing::warn!(%session_id, "client idle past read deadline");
        }
        other => {
            tracing::error!(%session_id, error = %other, "client read failed");
        }
    }
}
