//! relay-daemon: the messaging backend's single process.
//!
//! Owns the SQLite connection, the WebSocket transport state (`relay-hub`),
//! the delivery queue (`relay-queue`), and the `/api/v1` HTTP surface
//! (Section 6). A single Tokio runtime serves both the WebSocket upgrades
//! (`/events`, `/chat/:hex`) and the HTTP routes on one bound address, plus
//! one long-lived worker task draining the delivery queue into the
//! connection registry (Section 4.9, "Scheduling").

mod config;
mod dispatch;
mod error;
mod http;
mod state;

use std::sync::Arc;

use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use config::DaemonConfig;
use dispatch::MessageDispatcher;
use relay_hub::{ChannelHub, ConnectionRegistry, HubState};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = DaemonConfig::from_env()?;
    info!(addr = %config.bind_addr(), "relay-daemon starting");

    let conn = relay_db::open(&config.db_path())?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));

    let tokens = Arc::new(
        relay_crypto::TokenVerifier::new(config.jwt_secret.clone().into_bytes())
            .with_cookie_name(relay_crypto::token::DEFAULT_COOKIE_NAME),
    );
    let registry = Arc::new(ConnectionRegistry::new());
    let channels = Arc::new(ChannelHub::new());
    let queue: Arc<dyn relay_queue::JobQueue> = build_queue(&config).await?;
    let config = Arc::new(config);

    let app_state = Arc::new(AppState {
        db: db.clone(),
        tokens: tokens.clone(),
        registry: registry.clone(),
        channels: channels.clone(),
        queue: queue.clone(),
        config: config.clone(),
    });

    let dispatcher: Arc<dyn relay_hub::Dispatcher> = Arc::new(MessageDispatcher::new(app_state.clone()));
    let hub_state = Arc::new(HubState { db, tokens, registry: registry.clone(), channels, dispatcher });

    let app = http::router(app_state)
        .merge(relay_hub::router(hub_state))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http());

    let worker = tokio::spawn(run_delivery_worker(queue, registry));

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!(addr = %config.bind_addr(), "listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                warn!(error = %e, "server exited with an error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
    }

    worker.abort();
    info!("relay-daemon stopped");
    Ok(())
}

/// Builds the delivery queue backend named by `REDIS_URI`/`REDIS_HOST`
/// (Section 6), falling back to the in-process queue for a single-instance
/// deployment or when the crate was built without the `redis-backend`
/// feature.
async fn build_queue(config: &DaemonConfig) -> anyhow::Result<Arc<dyn relay_queue::JobQueue>> {
    #[cfg(feature = "redis-backend")]
    if let Some(uri) = redis_uri(config) {
        info!("connecting to redis delivery queue");
        let queue = relay_queue::RedisQueue::connect(&uri).await?;
        return Ok(Arc::new(queue));
    }
    #[cfg(not(feature = "redis-backend"))]
    if redis_uri(config).is_some() {
        warn!("REDIS_HOST/REDIS_URI set but relay-daemon was built without the redis-backend feature; using the in-process queue");
    }

    Ok(Arc::new(relay_queue::MemoryQueue::new()))
}

#[cfg_attr(feature = "redis-backend", allow(dead_code))]
fn redis_uri(config: &DaemonConfig) -> Option<String> {
    if let Some(uri) = &config.redis_uri {
        return Some(uri.clone());
    }
    let host = config.redis_host.as_ref()?;
    let port = config.redis_port.unwrap_or(6379);
    Some(format!("redis://{host}:{port}"))
}

/// Drains the delivery queue and pushes each job's frame to every recipient
/// currently registered in the connection registry (Section 4.9). A
/// recipient with no open connection simply doesn't receive it — delivery
/// is best-effort, not store-and-forward beyond what the registry holds.
async fn run_delivery_worker(queue: Arc<dyn relay_queue::JobQueue>, registry: Arc<ConnectionRegistry>) {
    while let Some(job) = queue.dequeue().await {
        let frame = relay_types::OutboundFrame::new(job.data.kind, job.data.message);
        for recipient in &job.to {
            registry.send_to(recipient, frame.clone());
        }
    }
    info!("delivery worker stopped: queue closed");
}
