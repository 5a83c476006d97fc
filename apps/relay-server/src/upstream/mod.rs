//! Forwarding of relay events to the upstream application server.
//!
//! The upstream is an audit sink and, for `join_channel` only, an approval
//! gate. Calls are made once with no retry; callers decide what a failure means.

pub mod http;

use async_trait::async_trait;
use relay_common::OutboundEvent;
use serde::Serialize;

use crate::error::RelayError;

pub use http::HttpDispatcher;

/// The connection an upstream dispatch originated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub session_id: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub remote_addr: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthOutcome {
    Success,
    Failed,
}

#[async_trait]
pub trait UpstreamDispatcher: Send + Sync {
    /// Forward a channel or application event.
    async fn dispatch_message(
        &self,
        event: &OutboundEvent,
        client: &ClientInfo,
    ) -> Result<(), RelayError>;

    /// Report an authentication attempt, including the raw token for audit.
    async fn dispatch_authentication(
        &self,
        client: &ClientInfo,
        outcome: AuthOutcome,
        raw_token: &str,
    ) -> Result<(), RelayError>;
}

/// Used when no upstream is configured: every dispatch succeeds, so joins are
/// always approved.
pub struct NoopDispatcher;

#[async_trait]
impl UpstreamDispatcher for NoopDispatcher {
    async fn dispatch_message(
        &self,
        event: &OutboundEvent,
        client: &ClientInfo,
    ) -> Result<(), RelayError> {
        tracing::trace!(event = %event.event, session_id = %client.session_id, "upstream disabled; dropping dispatch");
        Ok(())
    }

    async fn dispatch_authentication(
        &self,
        _client: &ClientInfo,
        _outcome: AuthOutcome,
        _raw_token: &str,
    ) -> Result<(), RelayError> {
        Ok(())
    }
}
