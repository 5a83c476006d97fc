//! Periodic transport pings for one session.

use std::sync::Arc;

use tokio::time;

use crate::logging;

use super::relay::RelayServer;
use super::session::Session;

/// Ping `session` every `ping_interval` until it stops being live.
///
/// Stops on the first failed ping, when the session closes, or when it is no
/// longer registered with `relay`. Never tears the session down itself; the
/// read loop notices the dead connection and does that.
pub async fn run(relay: Arc<RelayServer>, session: Arc<Session>) {
    let mut ticker = time::interval(relay.config().ping_interval);
    ticker.tick().await; // First tick fires immediately; skip it.

    loop {
        ticker.tick().await;

        if !session.is_connected() || !relay.is_registered(&session.id) {
            break;
        }

        if let Err(err) = session.send_ping().await {
            tracing::debug!(session_id = %session.id, error = %err, "keepalive ping failed");
            break;
        }
        logging::ping_sent(&session.id);
    }

    tracing::trace!(session_id = %session.id, "keepalive stopped");
}
