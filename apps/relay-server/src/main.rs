use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use relay_server::auth::JwtValidator;
use relay_server::config::Config;
use relay_server::gateway::RelayServer;
use relay_server::upstream::{HttpDispatcher, NoopDispatcher, UpstreamDispatcher};
use relay_server::{logging, AppState};

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    logging::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };
    let port = config.port;

    let upstream: Arc<dyn UpstreamDispatcher> = match &config.upstream_url {
        Some(url) => {
            match HttpDispatcher::new(url, config.upstream_token.clone(), config.upstream_timeout) {
                Ok(dispatcher) => {
                    tracing::info!(%url, "upstream dispatch enabled");
                    Arc::new(dispatcher)
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to build upstream client");
                    std::process::exit(1);
                }
            }
        }
        None => {
            tracing::warn!("UPSTREAM_URL not set; client messages will not be forwarded");
            Arc::new(NoopDispatcher)
        }
    };

    let relay = Arc::new(RelayServer::new(
        config.relay.clone(),
        Arc::new(JwtValidator::new(&config.jwt_secret)),
        upstream,
    ));

    let state = AppState {
        relay: relay.clone(),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(relay_server::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%addr, error = %err, "failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "relay-server listening");

    let shutdown = async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for shutdown signal");
        }
        tracing::info!("shutdown signal received");
        relay.shutdown().await;
    };

    if let Err(err) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    {
        tracing::error!(error = %err, "server error");
    }
}
