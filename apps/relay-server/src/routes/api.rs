//! Server-side API for the upstream application.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use relay_common::OutboundEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::middleware::ApiToken;
use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/broadcast", post(broadcast))
        .route("/channels", get(list_channels))
}

// ---------------------------------------------------------------------------
// POST /api/broadcast
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub channel: String,
    pub event: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastResponse {
    pub id: String,
    pub recipients: usize,
}

/// Push a server-originated event to every subscriber of a channel.
pub async fn broadcast(
    _token: ApiToken,
    State(state): State<AppState>,
    Json(body): Json<BroadcastRequest>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    if body.channel.is_empty() {
        return Err(ApiError::bad_request("channel is required"));
    }
    if body.event.is_empty() {
        return Err(ApiError::bad_request("event is required"));
    }
    if state.relay.channels().lookup(&body.channel).is_none() {
        return Err(ApiError::not_found("Channel not found"));
    }

    let event = OutboundEvent::new(body.event)
        .with_channel(&body.channel)
        .with_data(body.data);
    let recipients = state.relay.broadcast_to_channel(&body.channel, &event).await;

    tracing::info!(channel = %body.channel, event = %event.event, recipients, "api broadcast");

    Ok(Json(BroadcastResponse {
        id: event.id,
        recipients,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/channels
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub name: String,
    pub private: bool,
    pub require_auth: bool,
    pub subscribers: usize,
    pub created_at: DateTime<Utc>,
}

pub async fn list_channels(
    _token: ApiToken,
    State(state): State<AppState>,
) -> Json<Vec<ChannelSummary>> {
    let channels = state
        .relay
        .channels()
        .list()
        .into_iter()
        .map(|channel| ChannelSummary {
            name: channel.name.clone(),
            private: channel.private,
            require_auth: channel.require_auth,
            subscribers: channel.subscriber_count(),
            created_at: channel.created_at,
        })
        .collect();

    Json(channels)
}
