//! Accept loop and server handle
//!
//! `ChatServer` owns the listening socket and the shared registry.
//! Each accepted connection is registered and handed its own tasks;
//! a slow or broken client never blocks the accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::connection;
use crate::error::Result;
use crate::registry::Registry;

/// The broadcast chat server
#[derive(Debug)]
pub struct ChatServer {
    listener: TcpListener,
    registry: Arc<Registry>,
}

impl ChatServer {
    /// Bind the listening socket.
    ///
    /// The address comes from [`Settings::resolve_bind_addr`], which
    /// has already validated the port and resolved the host to an
    /// IPv4 address.
    ///
    /// [`Settings::resolve_bind_addr`]: crate::config::Settings::resolve_bind_addr
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("server started on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
        })
    }

    /// Address the server is actually listening on.
    ///
    /// Differs from the configured address when port 0 was requested.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the connection registry
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections forever.
    ///
    /// Only a failure of the listener itself ends the loop; everything
    /// that happens on an accepted socket stays on that connection's
    /// tasks.
    pub async fn run(self) -> Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            stream.set_nodelay(true).ok();

            info!("trying to connect new client {}", peer);
            connection::spawn(stream, peer, self.registry.clone());
            info!("clients connected: {}", self.registry.len());
        }
    }
}
