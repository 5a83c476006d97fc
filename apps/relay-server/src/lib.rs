pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod routes;
pub mod upstream;

use std::sync::Arc;

use config::Config;
use gateway::RelayServer;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayServer>,
    pub config: Arc<Config>,
}
