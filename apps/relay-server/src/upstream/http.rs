//! HTTP upstream: one JSON POST per dispatch.

use std::time::Duration;

use async_trait::async_trait;
use relay_common::OutboundEvent;
use serde::Serialize;

use crate::error::RelayError;

use super::{AuthOutcome, ClientInfo, UpstreamDispatcher};

/// Body POSTed to the upstream, discriminated by `type`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum UpstreamPayload<'a> {
    Message {
        event: &'a OutboundEvent,
        client: &'a ClientInfo,
    },
    Authentication {
        status: AuthOutcome,
        token: &'a str,
        client: &'a ClientInfo,
    },
}

#[derive(Clone)]
pub struct HttpDispatcher {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpDispatcher {
    pub fn new(url: &str, token: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            token,
        })
    }

    async fn post(&self, payload: &UpstreamPayload<'_>) -> Result<(), RelayError> {
        let mut request = self.http.post(&self.url).json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await.map_err(|e| {
            tracing::debug!(?e, url = %self.url, "upstream request failed");
            RelayError::UpstreamDispatch(e.to_string())
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RelayError::UpstreamDispatch(format!(
                "upstream responded with {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UpstreamDispatcher for HttpDispatcher {
    async fn dispatch_message(
        &self,
        event: &OutboundEvent,
        client: &ClientInfo,
    ) -> Result<(), RelayError> {
        self.post(&UpstreamPayload::Message { event, client }).await
    }

    async fn dispatch_authentication(
        &self,
        client: &ClientInfo,
        outcome: AuthOutcome,
        raw_token: &str,
    ) -> Result<(), RelayError> {
        self.post(&UpstreamPayload::Authentication {
            status: outcome,
            token: raw_token,
            client,
        })
        .await
    }
}
