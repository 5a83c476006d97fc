//! WebSocket upgrade handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocket;
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::StreamExt;

use crate::AppState;

use super::session::Session;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    ws.on_upgrade(move |socket| handle_connection(socket, state, addr, user_agent))
}

async fn handle_connection(socket: WebSocket, state: AppState, addr: SocketAddr, user_agent: String) {
    let (ws_tx, ws_rx) = socket.split();

    let session = Arc::new(Session::new(
        addr.to_string(),
        user_agent,
        Box::new(ws_tx),
        Box::new(ws_rx),
        state.relay.config(),
    ));

    state.relay.clone().serve(session).await;
}
