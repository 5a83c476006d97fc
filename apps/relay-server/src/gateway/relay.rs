//! The relay server: owner of every live session and every channel.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use relay_common::{EventName, OutboundEvent};
use serde_json::{json, Value};

use crate::auth::TokenValidator;
use crate::config::RelayConfig;
use crate::logging;
use crate::upstream::UpstreamDispatcher;

use super::channel::ChannelRegistry;
use super::keepalive;
use super::router;
use super::session::{Identity, Session};

pub struct RelayServer {
    sessions: DashMap<String, Arc<Session>>,
    channels: ChannelRegistry,
    validator: Arc<dyn TokenValidator>,
    upstream: Arc<dyn UpstreamDispatcher>,
    config: RelayConfig,
}

impl RelayServer {
    pub fn new(
        config: RelayConfig,
        validator: Arc<dyn TokenValidator>,
        upstream: Arc<dyn UpstreamDispatcher>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            channels: ChannelRegistry::new(config.auth_channel_prefixes.clone()),
            validator,
            upstream,
            config,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn validator(&self) -> &dyn TokenValidator {
        self.validator.as_ref()
    }

    pub fn upstream(&self) -> &dyn UpstreamDispatcher {
        self.upstream.as_ref()
    }

    // -- session registry ---------------------------------------------------

    pub fn register(&self, session: Arc<Session>) {
        self.sessions.insert(session.id.clone(), session);
    }

    pub fn is_registered(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn session(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    // -- connection lifecycle -----------------------------------------------

    /// Run a freshly accepted session until its connection ends.
    ///
    /// Registers the session, starts its keepalive task, and reads events
    /// until the first fatal error. Then tears the session down.
    pub async fn serve(self: Arc<Self>, session: Arc<Session>) {
        self.register(session.clone());
        logging::client_connected(&session.id, &session.remote_addr, &session.user_agent);

        tokio::spawn(keepalive::run(self.clone(), session.clone()));

        loop {
            match session.read_next_event().await {
                Ok(event) => router::route(&self, &session, event).await,
                Err(err) if err.is_fatal() => {
                    logging::read_terminated(&session.id, &err);
                    break;
                }
                Err(err) => {
                    tracing::warn!(session_id = %session.id, error = %err, "recoverable read error");
                }
            }
        }

        self.disconnect(&session).await;
    }

    /// Remove a session from the server and from every channel, then close it.
    ///
    /// Each channel the session was in gets a `leave_channel` upstream
    /// dispatch. Only the first call for a session does anything.
    pub async fn disconnect(&self, session: &Session) {
        if !session.begin_teardown() {
            return;
        }

        let identity = session.identity();
        logging::client_disconnected(&session.id, &identity.username, &session.remote_addr);

        self.sessions.remove(&session.id);

        let client = session.client_info();
        for (name, membership) in session.take_memberships() {
            let Some(channel) = self.channels.lookup(&name) else {
                continue;
            };
            channel.remove_subscriber(&session.id);

            let event = connection_lost_leave(session, &identity, &name, membership.data);
            match self.upstream.dispatch_message(&event, &client).await {
                Ok(()) => {
                    tracing::debug!(session_id = %session.id, channel = %name, "upstream notified of disconnect leave");
                }
                Err(err) => {
                    tracing::error!(session_id = %session.id, channel = %name, error = %err, "disconnect leave_channel dispatch failed");
                }
            }
        }

        session.close().await;
    }

    /// Disconnect every live session.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        tracing::info!(count = sessions.len(), "closing all sessions");

        for session in sessions {
            self.disconnect(&session).await;
        }
    }

    // -- fanout -------------------------------------------------------------

    /// Deliver `event` to every current subscriber of `channel`.
    ///
    /// Sends run concurrently against a snapshot of the subscriber set; a
    /// failed delivery is logged and does not affect the others. Returns the
    /// number of successful deliveries.
    pub async fn broadcast_to_channel(&self, channel: &str, event: &OutboundEvent) -> usize {
        let Some(channel) = self.channels.lookup(channel) else {
            tracing::debug!(%channel, event = %event.event, "broadcast to unknown channel dropped");
            return 0;
        };

        let name = channel.name.as_str();
        let subscribers = channel.subscribers();
        let deliveries = subscribers.iter().map(|session| async move {
            match session.send(event).await {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(
                        session_id = %session.id,
                        channel = %name,
                        error = %err,
                        "broadcast delivery failed"
                    );
                    false
                }
            }
        });

        join_all(deliveries).await.into_iter().filter(|ok| *ok).count()
    }
}

/// The `leave_channel` dispatched for a channel the session did not leave
/// itself. Carries the join metadata when there is some, otherwise a payload
/// tagged as a lost connection.
pub(crate) fn connection_lost_leave(
    session: &Session,
    identity: &Identity,
    channel: &str,
    stored: Option<Value>,
) -> OutboundEvent {
    let payload = stored.unwrap_or_else(|| {
        json!({
            "channel": channel,
            "client_id": session.id,
            "user_id": identity.user_id,
            "username": identity.username,
            "disconnect_type": "connection_lost",
            "reason": "client_disconnected",
        })
    });

    OutboundEvent::new(EventName::LEAVE_CHANNEL)
        .with_channel(channel)
        .with_data(Some(payload))
        .from_user(identity.user_id.clone(), identity.username.clone())
}
