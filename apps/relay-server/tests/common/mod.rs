#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use relay_common::OutboundEvent;
use serde::Serialize;

use relay_server::auth::JwtValidator;
use relay_server::config::{Config, RelayConfig};
use relay_server::error::RelayError;
use relay_server::gateway::RelayServer;
use relay_server::upstream::{AuthOutcome, ClientInfo, UpstreamDispatcher};
use relay_server::AppState;

pub const JWT_SECRET: &str = "integration-test-secret";
pub const API_TOKEN: &str = "integration-api-token";

/// Upstream double that records every dispatch.
#[derive(Default)]
pub struct RecordingUpstream {
    messages: Mutex<Vec<(OutboundEvent, ClientInfo)>>,
    auth: Mutex<Vec<(AuthOutcome, ClientInfo)>>,
}

impl RecordingUpstream {
    pub fn messages(&self) -> Vec<(OutboundEvent, ClientInfo)> {
        self.messages.lock().clone()
    }

    pub fn auth_dispatches(&self) -> Vec<(AuthOutcome, ClientInfo)> {
        self.auth.lock().clone()
    }

    /// Poll until a recorded message matches, or give up after two seconds.
    pub async fn wait_for_message<F>(&self, pred: F) -> Option<(OutboundEvent, ClientInfo)>
    where
        F: Fn(&OutboundEvent) -> bool,
    {
        for _ in 0..100 {
            if let Some(found) = self.messages().into_iter().find(|(e, _)| pred(e)) {
                return Some(found);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        None
    }
}

#[async_trait]
impl UpstreamDispatcher for RecordingUpstream {
    async fn dispatch_message(
        &self,
        event: &OutboundEvent,
        client: &ClientInfo,
    ) -> Result<(), RelayError> {
        self.messages.lock().push((event.clone(), client.clone()));
        Ok(())
    }

    async fn dispatch_authentication(
        &self,
        client: &ClientInfo,
        outcome: AuthOutcome,
        _raw_token: &str,
    ) -> Result<(), RelayError> {
        self.auth.lock().push((outcome, client.clone()));
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        port: 0,
        jwt_secret: JWT_SECRET.to_string(),
        http_api_token: API_TOKEN.to_string(),
        upstream_url: None,
        upstream_token: None,
        upstream_timeout: Duration::from_secs(5),
        relay: RelayConfig {
            auth_channel_prefixes: vec!["private-".to_string()],
            ..RelayConfig::default()
        },
    }
}

pub fn test_state() -> (AppState, Arc<RecordingUpstream>) {
    let config = test_config();
    let upstream = Arc::new(RecordingUpstream::default());
    let relay = Arc::new(RelayServer::new(
        config.relay.clone(),
        Arc::new(JwtValidator::new(&config.jwt_secret)),
        upstream.clone(),
    ));
    let state = AppState {
        relay,
        config: Arc::new(config),
    };
    (state, upstream)
}

pub fn test_app() -> (Router, AppState, Arc<RecordingUpstream>) {
    let (state, upstream) = test_state();
    let app = relay_server::routes::router().with_state(state.clone());
    (app, state, upstream)
}

/// Start a real TCP server with connect info. The server runs in the background.
pub async fn start_server() -> (SocketAddr, AppState, Arc<RecordingUpstream>) {
    let (app, state, upstream) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    (addr, state, upstream)
}

#[derive(Serialize)]
struct TestClaims<'a> {
    sub: &'a str,
    username: &'a str,
    email: &'a str,
    exp: i64,
}

/// Mint an HS256 client token signed with [`JWT_SECRET`].
pub fn mint_token(user_id: &str, username: &str) -> String {
    let claims = TestClaims {
        sub: user_id,
        username,
        email: "test@example.com",
        exp: (chrono::Utc::now() + chrono::Duration::seconds(300)).timestamp(),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("mint test token")
}
