//! In-process doubles for gateway unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_common::OutboundEvent;

use crate::auth::{Claims, TokenValidator};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::upstream::{AuthOutcome, ClientInfo, UpstreamDispatcher};

use super::relay::RelayServer;
use super::session::Session;
use super::transport::memory::{self, MemoryPeer};

pub const VALID_TOKEN: &str = "valid-token";

/// Accepts exactly [`VALID_TOKEN`] as user `user-1` / `ada`.
pub struct StaticValidator;

impl TokenValidator for StaticValidator {
    fn validate_token(&self, token: &str) -> Result<Claims, RelayError> {
        if token != VALID_TOKEN {
            return Err(RelayError::Authentication("unknown token".into()));
        }
        Ok(Claims {
            sub: "user-1".into(),
            exp: i64::MAX,
            username: Some("ada".into()),
            name: None,
            email: Some("ada@example.com".into()),
        })
    }
}

/// Records every dispatch attempt; message dispatches can be made to fail.
#[derive(Default)]
pub struct RecordingDispatcher {
    messages: Mutex<Vec<OutboundEvent>>,
    auth: Mutex<Vec<(AuthOutcome, String)>>,
    fail_messages: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingDispatcher {
    pub fn fail_messages(&self, fail: bool) {
        self.fail_messages.store(fail, Ordering::SeqCst);
    }

    /// Hold every message dispatch for `delay` before answering.
    pub fn delay_messages(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn messages(&self) -> Vec<OutboundEvent> {
        self.messages.lock().clone()
    }

    pub fn auth_dispatches(&self) -> Vec<(AuthOutcome, String)> {
        self.auth.lock().clone()
    }
}

#[async_trait]
impl UpstreamDispatcher for RecordingDispatcher {
    async fn dispatch_message(
        &self,
        event: &OutboundEvent,
        _client: &ClientInfo,
    ) -> Result<(), RelayError> {
        self.messages.lock().push(event.clone());
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(RelayError::UpstreamDispatch("simulated failure".into()));
        }
        Ok(())
    }

    async fn dispatch_authentication(
        &self,
        _client: &ClientInfo,
        outcome: AuthOutcome,
        raw_token: &str,
    ) -> Result<(), RelayError> {
        self.auth.lock().push((outcome, raw_token.to_string()));
        Ok(())
    }
}

/// A session over an in-memory transport, not registered anywhere.
pub fn memory_session(config: &RelayConfig) -> (Arc<Session>, MemoryPeer) {
    let (sink, stream, peer) = memory::pair();
    let session = Session::new("127.0.0.1:40000", "test-agent", Box::new(sink), Box::new(stream), config);
    (Arc::new(session), peer)
}

pub fn test_relay_with(config: RelayConfig, upstream: Arc<RecordingDispatcher>) -> Arc<RelayServer> {
    Arc::new(RelayServer::new(config, Arc::new(StaticValidator), upstream))
}

pub fn test_relay() -> (Arc<RelayServer>, Arc<RecordingDispatcher>) {
    let upstream = Arc::new(RecordingDispatcher::default());
    (test_relay_with(RelayConfig::default(), upstream.clone()), upstream)
}

/// A memory session registered with `relay`, as if it had just connected.
pub fn connect(relay: &RelayServer) -> (Arc<Session>, MemoryPeer) {
    let (session, peer) = memory_session(relay.config());
    relay.register(session.clone());
    (session, peer)
}
