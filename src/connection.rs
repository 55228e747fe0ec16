//! Per-connection tasks
//!
//! Each accepted socket gets two tasks: a read loop that walks the
//! connection through `Handshaking -> Open -> Closed`, and a writer
//! that drains the outbound channel into the socket. The read loop
//! owns all per-connection state; the registry only ever touches the
//! sending half of the channel.
//!
//! Every error is contained here. A connection that misbehaves is
//! logged and torn down without disturbing the accept loop or any
//! other client.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};

use crate::RECV_BUFFER_SIZE;
use crate::error::{Error, Result};
use crate::frame::decode_client_frame;
use crate::handshake;
use crate::registry::{ClientHandle, Registry};

/// Register a freshly accepted socket and start its tasks.
///
/// Registration happens synchronously so the caller observes an
/// accurate client count; everything else runs on the two spawned
/// tasks. Generic over the stream type so connections can be driven
/// over in-memory duplex pipes in tests.
pub fn spawn<S>(stream: S, peer: SocketAddr, registry: Arc<Registry>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = ClientHandle::new(peer, tx);
    registry.insert(handle.clone());

    tokio::spawn(write_loop(writer, rx, peer));
    tokio::spawn(read_loop(reader, handle, registry));
}

/// Drain the outbound channel into the socket.
///
/// A write failure marks the connection dead: the receiver is dropped,
/// the registry's liveness probe turns false, and the next broadcast
/// pass prunes the entry. The frame that failed is dropped, not
/// retried or surfaced to its sender.
async fn write_loop<S>(mut writer: WriteHalf<S>, mut rx: UnboundedReceiver<Bytes>, peer: SocketAddr)
where
    S: AsyncWrite + Send + 'static,
{
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            debug!("write to {} failed: {}", peer, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}

/// Drive the connection through its lifecycle.
async fn read_loop<S>(mut reader: ReadHalf<S>, handle: ClientHandle, registry: Arc<Registry>)
where
    S: AsyncRead + Send + 'static,
{
    let peer = handle.peer();
    let mut buf = BytesMut::with_capacity(RECV_BUFFER_SIZE);

    // Handshaking: one read decides whether this is a WebSocket client.
    match negotiate(&mut reader, &mut buf, &handle).await {
        Ok(()) => info!("client {} connected", peer),
        Err(e) => {
            warn!("handshake with {} failed: {}", peer, e);
            registry.remove(peer);
            return;
        }
    }

    // Open: decode frames and hand them to the broadcaster until the
    // peer goes away or violates the protocol.
    match relay(&mut reader, &mut buf, peer, &registry).await {
        Ok(()) => info!("client {} disconnected", peer),
        Err(e @ Error::UnmaskedFrame { .. }) => warn!("{}; disconnecting {}", e, peer),
        Err(e) => error!("socket error on {}: {}", peer, e),
    }
    registry.disconnect(peer);
}

/// Perform the server side of the opening handshake.
///
/// The upgrade request must arrive in the first read; a request split
/// across reads, or a first read that is not an HTTP GET, closes the
/// connection. Bytes trailing the request are left in `buf` for the
/// frame decoder.
async fn negotiate<R>(reader: &mut R, buf: &mut BytesMut, handle: &ClientHandle) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let n = reader.read_buf(buf).await?;
    if n == 0 {
        return Err(Error::ConnectionClosed);
    }

    if !handshake::is_upgrade_request(buf) {
        return Err(Error::Handshake("first read is not an HTTP upgrade"));
    }

    let (key, consumed) = handshake::parse_upgrade(buf)?;
    let accept = handshake::generate_accept_key(key);
    handle.send(handshake::build_response(&accept));

    buf.advance(consumed);
    Ok(())
}

/// Decode and broadcast frames until the connection ends.
///
/// Ok(()) means the peer closed the socket; any Err is a violation or
/// transport failure that forces the disconnect path.
async fn relay<R>(
    reader: &mut R,
    buf: &mut BytesMut,
    peer: SocketAddr,
    registry: &Registry,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        while let Some((frame, consumed)) = decode_client_frame(buf)? {
            buf.advance(consumed);

            if frame.payload.is_empty() {
                warn!("zero-length frame from {}, ignoring", peer);
                continue;
            }

            let text = frame.into_text();
            info!("new message from {}: {}", peer, text);
            registry.broadcast(peer, &text);
        }

        let n = reader.read_buf(buf).await?;
        if n == 0 {
            return Ok(());
        }
    }
}
