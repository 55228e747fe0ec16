//! # chat-relay: a from-scratch WebSocket broadcast server
//!
//! A chat relay built directly on TCP: the RFC 6455 opening handshake,
//! the binary frame codec, and the connection/broadcast bookkeeping
//! are all implemented here rather than pulled from a WebSocket
//! library. Every text message a client sends is fanned out to every
//! other connected client, best-effort.
//!
//! ## What it deliberately does not do
//!
//! Text frames only: no binary messages, no ping/pong or close frame
//! handling, no fragmentation reassembly, no compression, no TLS.
//!
//! ## Example
//!
//! ```ignore
//! use chat_relay::config::Settings;
//! use chat_relay::ChatServer;
//!
//! let settings = Settings::new()?;
//! let server = ChatServer::bind(settings.resolve_bind_addr()?).await?;
//! server.run().await
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod mask;
pub mod registry;
pub mod server;

pub use error::{Error, Result};
pub use registry::{ClientHandle, Delivery, Registry};
pub use server::ChatServer;

/// WebSocket GUID for handshake (RFC 6455 §1.3)
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Largest payload length the 7-bit direct encoding can carry
pub const SMALL_PAYLOAD_THRESHOLD: usize = 125;

/// Largest payload length the 16-bit extended encoding can carry
pub const MEDIUM_PAYLOAD_THRESHOLD: usize = 65535;

/// Per-connection receive buffer size (64KB for high throughput)
pub const RECV_BUFFER_SIZE: usize = 64 * 1024;

/// Upper bound on a single frame's declared payload length (16MB)
pub const MAX_FRAME_PAYLOAD: usize = 16 * 1024 * 1024;
