//! Connection registry and broadcast fan-out
//!
//! The registry is the only state shared between the accept loop and
//! the per-connection tasks. Members are keyed by remote endpoint:
//! two handles refer to the same peer iff their socket addresses are
//! equal, which also matches a reconnecting client to its old entry.
//!
//! Delivery is best-effort. Each member is reached through an
//! unbounded channel drained by that connection's writer task; a
//! closed channel means the connection is gone, and `broadcast`
//! prunes every member it finds dead during a pass.

use std::net::SocketAddr;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::frame::encode_text_frame;

/// Outcome of a single best-effort send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Frame was queued on the member's outbound channel
    Delivered,
    /// The member's channel is closed; the frame was dropped
    Dropped,
}

/// Sending side of one connection, as seen by the registry
#[derive(Debug, Clone)]
pub struct ClientHandle {
    peer: SocketAddr,
    sender: UnboundedSender<Bytes>,
}

impl ClientHandle {
    /// Create a handle for a connection's outbound channel
    pub fn new(peer: SocketAddr, sender: UnboundedSender<Bytes>) -> Self {
        Self { peer, sender }
    }

    /// Remote endpoint identifying this connection
    #[inline]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Advisory liveness probe: true while the connection's writer
    /// task still holds the receiving end. May race with concurrent
    /// disconnection.
    #[inline]
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue an already-encoded frame for this member.
    ///
    /// Failure means the connection is gone; the frame is dropped
    /// rather than surfaced to the sender.
    pub fn send(&self, frame: Bytes) -> Delivery {
        match self.sender.send(frame) {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::Dropped,
        }
    }
}

/// The live set of connected clients
#[derive(Debug, Default)]
pub struct Registry {
    clients: Mutex<Vec<ClientHandle>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered clients
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// True when no clients are registered
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }

    /// Register a newly accepted connection.
    ///
    /// A stale entry for the same endpoint (a reconnect racing its
    /// own cleanup) is replaced rather than duplicated.
    pub fn insert(&self, handle: ClientHandle) {
        let mut clients = self.clients.lock();
        clients.retain(|c| c.peer() != handle.peer());
        clients.push(handle);
    }

    /// Remove a connection without notifying anyone.
    ///
    /// Used for connections that never completed the handshake.
    pub fn remove(&self, peer: SocketAddr) {
        self.clients.lock().retain(|c| c.peer() != peer);
    }

    /// Send `message` to every live member except `origin`.
    ///
    /// The member list is snapshotted before sending, so a pass never
    /// iterates under mutation. Members found dead during the pass
    /// are pruned afterwards. Returns the number of deliveries.
    pub fn broadcast(&self, origin: SocketAddr, message: &str) -> usize {
        info!("broadcast from {}: {}", origin, message);

        let frame = encode_text_frame(message);
        let members: Vec<ClientHandle> = self.clients.lock().clone();

        let mut delivered = 0;
        for client in members.iter().filter(|c| c.peer() != origin) {
            if !client.is_alive() {
                continue;
            }
            match client.send(frame.clone()) {
                Delivery::Delivered => delivered += 1,
                Delivery::Dropped => debug!("dropped broadcast to {}", client.peer()),
            }
        }

        self.clients.lock().retain(|c| c.is_alive());
        delivered
    }

    /// Announce a departure to the remaining clients and remove the
    /// connection from the registry.
    pub fn disconnect(&self, peer: SocketAddr) {
        self.broadcast(peer, &format!("Client {} has been disconnected", peer));
        self.remove(peer);
    }
}
