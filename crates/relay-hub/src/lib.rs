//! # relay-hub
//!
//! The WebSocket transport layer (Section 4.5–4.7). Owns connection
//! bookkeeping and topic fan-out; delegates the actual per-frame business
//! logic (validate, persist, publish, enqueue) to a [`Dispatcher`]
//! implementation it is handed at construction time, so this crate never
//! needs to depend on `relay-validate` or `relay-queue` directly — the same
//! separation the teacher keeps between its transport crate and its
//! application-level event handling.

pub mod channel;
pub mod registry;
pub mod session;

use std::sync::Arc;

use async_trait::async_trait;
use relay_types::{Frame, Hex, Principal};
use tokio::sync::Mutex;

pub use channel::{ChannelHub, Topic};
pub use registry::{ConnectionHandle, ConnectionRegistry, SocketId};
pub use session::router;

/// Implemented by the crate that owns business logic for inbound frames
/// (C8, `relay-daemon`). `relay-hub` calls this once per inbound frame and
/// otherwise has no opinion on what a frame means.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Handles one inbound frame from `sender` on behalf of `conversation`
    /// (the `/chat/:hex` the socket is attached to). Returns an outbound
    /// frame to send back to `sender` alone on failure; success is
    /// communicated by side effect (persistence + publish), not a return
    /// value — mirrors Section 4.9's "publish is fire-and-forget; errors
    /// are a reply, not an exception".
    async fn dispatch(&self, sender: &Principal, conversation: &Hex, frame: Frame) -> Option<relay_types::OutboundFrame>;
}

/// Shared state handed to every axum handler in [`session`].
pub struct HubState {
    pub db: Arc<Mutex<rusqlite::Connection>>,
    pub tokens: Arc<relay_crypto::TokenVerifier>,
    pub registry: Arc<ConnectionRegistry>,
    pub channels: Arc<ChannelHub>,
    pub dispatcher: Arc<dyn Dispatcher>,
}
