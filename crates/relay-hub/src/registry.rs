//! Connection registry (Section 4.5, C5).
//!
//! An in-process map from user hex to the set of that user's active
//! connection handles — one user may hold the global `/events` socket plus
//! zero or more `/chat/:hex` sockets. Generalizes the teacher's per-IP
//! `DashMap` rate-limiter bucket map to a per-user list of connections.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use relay_types::{Hex, OutboundFrame};

/// Opaque identifier for one socket, unique for the process lifetime.
pub type SocketId = u64;

/// A handle to one open socket: enough to push a frame at it and to remove
/// it from the registry again on close.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub socket_id: SocketId,
    sender: mpsc::UnboundedSender<OutboundFrame>,
}

impl ConnectionHandle {
    /// Sends a frame to this connection's write task. A closed socket simply
    /// drops the frame — the caller doesn't treat that as an error (Section
    /// 4.9: "absent connection is not a failure").
    pub fn send(&self, frame: OutboundFrame) {
        let _ = self.sender.send(frame);
    }
}

/// Thread-safe registry of active connections, keyed by user hex.
pub struct ConnectionRegistry {
    connections: DashMap<Hex, Vec<ConnectionHandle>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry { connections: DashMap::new(), next_id: AtomicU64::new(1) }
    }

    /// Allocates a fresh socket id and the paired sender/receiver the
    /// caller's write task should drain.
    pub fn new_connection(&self) -> (ConnectionHandle, mpsc::UnboundedReceiver<OutboundFrame>) {
        let socket_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        (ConnectionHandle { socket_id, sender }, receiver)
    }

    /// Registers a connection handle under `user`.
    pub fn add(&self, user: &Hex, handle: ConnectionHandle) {
        self.connections.entry(user.clone()).or_default().push(handle);
    }

    /// Removes one connection handle (by socket id) from `user`'s entry.
    /// Abrupt transport loss is handled identically to a clean close
    /// (Section 4.5) — both paths call this.
    pub fn remove(&self, user: &Hex, socket_id: SocketId) {
        if let Some(mut handles) = self.connections.get_mut(user) {
            handles.retain(|h| h.socket_id != socket_id);
            if handles.is_empty() {
                drop(handles);
                self.connections.remove(user);
            }
        }
    }

    /// Snapshots the current handles for `user`.
    pub fn get(&self, user: &Hex) -> Vec<ConnectionHandle> {
        self.connections.get(user).map(|h| h.clone()).unwrap_or_default()
    }

    /// Pushes `frame` to every connection currently registered for `user`.
    pub fn send_to(&self, user: &Hex, frame: OutboundFrame) {
        for handle in self.get(user) {
            handle.send(frame.clone());
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> OutboundFrame {
        OutboundFrame::system("hi", 1000)
    }

    #[test]
    fn add_then_get_returns_the_handle() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = registry.new_connection();
        registry.add(&"u1".to_string(), handle);

        assert_eq!(registry.get(&"u1".to_string()).len(), 1);
    }

    #[test]
    fn a_user_may_hold_multiple_connections() {
        let registry = ConnectionRegistry::new();
        let (h1, _rx1) = registry.new_connection();
        let (h2, _rx2) = registry.new_connection();
        registry.add(&"u1".to_string(), h1);
        registry.add(&"u1".to_string(), h2);

        assert_eq!(registry.get(&"u1".to_string()).len(), 2);
    }

    #[test]
    fn remove_drops_only_the_named_socket() {
        let registry = ConnectionRegistry::new();
        let (h1, _rx1) = registry.new_connection();
        let (h2, _rx2) = registry.new_connection();
        let id1 = h1.socket_id;
        registry.add(&"u1".to_string(), h1);
        registry.add(&"u1".to_string(), h2);

        registry.remove(&"u1".to_string(), id1);
        assert_eq!(registry.get(&"u1".to_string()).len(), 1);
    }

    #[test]
    fn removing_the_last_handle_clears_the_entry() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = registry.new_connection();
        let id = handle.socket_id;
        registry.add(&"u1".to_string(), handle);

        registry.remove(&"u1".to_string(), id);
        assert!(registry.get(&"u1".to_string()).is_empty());
    }

    #[tokio::test]
    async fn send_to_delivers_to_every_registered_handle() {
        let registry = ConnectionRegistry::new();
        let (h1, mut rx1) = registry.new_connection();
        let (h2, mut rx2) = registry.new_connection();
        registry.add(&"u1".to_string(), h1);
        registry.add(&"u1".to_string(), h2);

        registry.send_to(&"u1".to_string(), sample_frame());

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }
}
