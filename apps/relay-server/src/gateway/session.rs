//! Per-connection session state and serialized transport access.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use relay_common::OutboundEvent;
use serde_json::Value;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::{self, Instant};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::logging;
use crate::upstream::ClientInfo;

use super::events::InboundEvent;
use super::transport::{Frame, TransportSink, TransportStream};

/// Metadata recorded against a channel when the session joined it.
#[derive(Debug, Clone, PartialEq)]
pub struct Membership {
    /// The `data` payload supplied with `join_channel`, if any.
    pub data: Option<Value>,
    pub joined_at: DateTime<Utc>,
}

/// Who the session is authenticated as. Empty strings until `authenticate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub username: String,
    pub email: String,
}

struct SessionState {
    identity: Identity,
    last_activity: DateTime<Utc>,
    memberships: HashMap<String, Membership>,
    /// Set once teardown starts; no membership may be added afterwards.
    torn_down: bool,
}

/// State for a single client connection.
///
/// Reads and writes go through separate locks so the keepalive and broadcast
/// paths can write while the read loop is parked. Identity and memberships sit
/// behind a third, synchronous lock that is never held across an await.
pub struct Session {
    /// Unique session identifier (`ses_` prefixed ULID).
    pub id: String,
    pub remote_addr: String,
    pub user_agent: String,
    state: Mutex<SessionState>,
    writer: AsyncMutex<Option<Box<dyn TransportSink>>>,
    reader: AsyncMutex<Option<Box<dyn TransportStream>>>,
    read_deadline: Mutex<Instant>,
    read_timeout: Duration,
    write_timeout: Duration,
    closed: watch::Sender<bool>,
}

impl Session {
    pub fn new(
        remote_addr: impl Into<String>,
        user_agent: impl Into<String>,
        sink: Box<dyn TransportSink>,
        stream: Box<dyn TransportStream>,
        config: &RelayConfig,
    ) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            id: relay_common::id::session_id(),
            remote_addr: remote_addr.into(),
            user_agent: user_agent.into(),
            state: Mutex::new(SessionState {
                identity: Identity::default(),
                last_activity: Utc::now(),
                memberships: HashMap::new(),
                torn_down: false,
            }),
            writer: AsyncMutex::new(Some(sink)),
            reader: AsyncMutex::new(Some(stream)),
            // A client that never speaks is dropped after one idle window.
            read_deadline: Mutex::new(Instant::now() + config.read_timeout),
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            closed,
        }
    }

    // -- transport ----------------------------------------------------------

    /// Wait for the next decoded client event.
    ///
    /// Pongs extend the deadline and are otherwise swallowed. Fails with
    /// `IdleTimeout` when the deadline passes, `Protocol` on an undecodable
    /// payload, and `ConnectionClosed` for everything else.
    pub async fn read_next_event(&self) -> Result<InboundEvent, RelayError> {
        if !self.is_connected() {
            return Err(RelayError::ConnectionClosed);
        }
        let mut reader = self.reader.lock().await;

        loop {
            let Some(stream) = reader.as_mut() else {
                return Err(RelayError::ConnectionClosed);
            };
            let deadline = *self.read_deadline.lock();

            let outcome = tokio::select! {
                biased;
                _ = wait_closed(self.closed.subscribe()) => None,
                res = time::timeout_at(deadline, stream.next_frame()) => Some(res),
            };

            let frame = match outcome {
                None => {
                    reader.take();
                    return Err(RelayError::ConnectionClosed);
                }
                Some(Err(_elapsed)) => return Err(RelayError::IdleTimeout),
                Some(Ok(None)) => return Err(RelayError::ConnectionClosed),
                Some(Ok(Some(Err(err)))) => {
                    tracing::debug!(session_id = %self.id, error = %err, "transport read failed");
                    return Err(RelayError::ConnectionClosed);
                }
                Some(Ok(Some(Ok(frame)))) => frame,
            };

            match frame {
                Frame::Text(text) => return self.decode(text.as_bytes()),
                Frame::Binary(bytes) => return self.decode(&bytes),
                Frame::Pong(_) => {
                    logging::pong_received(&self.id);
                    self.touch();
                }
                // The socket layer answers pings on its own.
                Frame::Ping(_) => {}
                Frame::Close => return Err(RelayError::ConnectionClosed),
            }
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<InboundEvent, RelayError> {
        let event = InboundEvent::from_slice(bytes)?;
        self.touch();
        Ok(event)
    }

    /// Push the read deadline one idle window past now.
    fn touch(&self) {
        *self.read_deadline.lock() = Instant::now() + self.read_timeout;
        self.state.lock().last_activity = Utc::now();
    }

    /// Serialize and write one event.
    pub async fn send(&self, event: &OutboundEvent) -> Result<(), RelayError> {
        let json = serde_json::to_string(event).map_err(|e| RelayError::Protocol(e.to_string()))?;
        self.write_frame(Frame::Text(json)).await
    }

    /// Transport-level liveness probe.
    pub async fn send_ping(&self) -> Result<(), RelayError> {
        self.write_frame(Frame::Ping(Vec::new())).await
    }

    async fn write_frame(&self, frame: Frame) -> Result<(), RelayError> {
        if !self.is_connected() {
            return Err(RelayError::ConnectionClosed);
        }
        let mut writer = self.writer.lock().await;
        let sink = writer.as_mut().ok_or(RelayError::ConnectionClosed)?;

        match time::timeout(self.write_timeout, sink.send_frame(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                tracing::debug!(session_id = %self.id, error = %err, "transport write failed");
                Err(RelayError::ConnectionClosed)
            }
            Err(_elapsed) => {
                tracing::debug!(session_id = %self.id, "transport write timed out");
                Err(RelayError::ConnectionClosed)
            }
        }
    }

    /// Release the transport. Safe to call repeatedly and from any task.
    pub async fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }

        let sink = self.writer.lock().await.take();
        if let Some(mut sink) = sink {
            let _ = time::timeout(self.write_timeout, sink.shutdown()).await;
        }

        // An in-flight read holds this lock; it notices `closed` and clears it itself.
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.take();
        }
    }

    pub fn is_connected(&self) -> bool {
        !*self.closed.borrow()
    }

    /// Returns `true` exactly once, for whichever caller tears the session down.
    ///
    /// Claimed under the same lock as membership edits, so every membership
    /// is either added before teardown (and later taken by it) or refused.
    pub(crate) fn begin_teardown(&self) -> bool {
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.torn_down, true)
    }

    // -- identity -----------------------------------------------------------

    pub fn set_identity(&self, user_id: &str, username: &str, email: &str) {
        self.state.lock().identity = Identity {
            user_id: user_id.to_string(),
            username: username.to_string(),
            email: email.to_string(),
        };
    }

    pub fn identity(&self) -> Identity {
        self.state.lock().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.state.lock().identity.user_id.is_empty()
    }

    pub fn username(&self) -> String {
        self.state.lock().identity.username.clone()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.state.lock().last_activity
    }

    /// Snapshot handed to the upstream dispatcher.
    pub fn client_info(&self) -> ClientInfo {
        let identity = self.identity();
        ClientInfo {
            session_id: self.id.clone(),
            user_id: identity.user_id,
            username: identity.username,
            email: identity.email,
            remote_addr: self.remote_addr.clone(),
            user_agent: self.user_agent.clone(),
        }
    }

    // -- memberships --------------------------------------------------------

    /// Record a joined channel. Returns `false`, recording nothing, once
    /// teardown has started.
    pub fn add_membership(&self, channel: &str, data: Option<Value>) -> bool {
        let mut state = self.state.lock();
        if state.torn_down {
            return false;
        }
        state.memberships.insert(
            channel.to_string(),
            Membership {
                data,
                joined_at: Utc::now(),
            },
        );
        true
    }

    pub fn remove_membership(&self, channel: &str) -> Option<Membership> {
        self.state.lock().memberships.remove(channel)
    }

    pub fn get_membership(&self, channel: &str) -> Option<Membership> {
        self.state.lock().memberships.get(channel).cloned()
    }

    pub fn all_memberships(&self) -> HashMap<String, Membership> {
        self.state.lock().memberships.clone()
    }

    /// Remove and return every membership at once.
    pub(crate) fn take_memberships(&self) -> HashMap<String, Membership> {
        std::mem::take(&mut self.state.lock().memberships)
    }
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}
