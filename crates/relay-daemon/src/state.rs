//! Shared process state, handed to both the HTTP router and the dispatcher.

use std::sync::Arc;

use relay_hub::{ChannelHub, ConnectionRegistry};
use tokio::sync::Mutex;

use crate::config::DaemonConfig;

pub struct AppState {
    pub db: Arc<Mutex<rusqlite::Connection>>,
    pub tokens: Arc<relay_crypto::TokenVerifier>,
    pub registry: Arc<ConnectionRegistry>,
    pub channels: Arc<ChannelHub>,
    pub queue: Arc<dyn relay_queue::JobQueue>,
    pub config: Arc<DaemonConfig>,
}
