//! RFC 6455 opening handshake
//!
//! A new connection speaks HTTP exactly once: the client sends a GET
//! upgrade request, the server answers with a fixed 101 response
//! carrying the derived `Sec-WebSocket-Accept` key, and every byte
//! after that is framed WebSocket traffic.

use base64::Engine;
use bytes::{BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

use crate::WS_GUID;
use crate::error::{Error, Result};

/// Maximum HTTP header size (8KB should be enough for any reasonable request)
const MAX_HEADER_SIZE: usize = 8192;

/// Classify a first read: upgrade requests start with an HTTP GET
/// request line, anything else is not a handshake.
#[inline]
pub fn is_upgrade_request(buf: &[u8]) -> bool {
    buf.starts_with(b"GET")
}

/// Parse a WebSocket upgrade request and extract its key.
///
/// Returns the trimmed `Sec-WebSocket-Key` value and the number of
/// bytes the request occupied (frame bytes may trail it in the same
/// read). The request must be complete in `buf`; a partial header
/// block is a handshake failure, not a wait-for-more condition.
pub fn parse_upgrade(buf: &[u8]) -> Result<(&str, usize)> {
    if buf.len() > MAX_HEADER_SIZE {
        return Err(Error::InvalidHttp("request too large"));
    }

    let mut headers = [httparse::EMPTY_HEADER; 32];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(buf) {
        Ok(httparse::Status::Complete(len)) => {
            if req.method != Some("GET") {
                return Err(Error::InvalidHttp("method must be GET"));
            }

            for header in req.headers.iter() {
                if header.name.eq_ignore_ascii_case("sec-websocket-key") {
                    let value = std::str::from_utf8(header.value)
                        .map_err(|_| Error::InvalidHttp("invalid header value"))?;
                    return Ok((value.trim(), len));
                }
            }

            Err(Error::Handshake("missing Sec-WebSocket-Key"))
        }
        Ok(httparse::Status::Partial) => Err(Error::Handshake("incomplete upgrade request")),
        Err(_) => Err(Error::InvalidHttp("failed to parse HTTP request")),
    }
}

/// Derive the `Sec-WebSocket-Accept` value for a client key.
///
/// This computes: Base64(SHA-1(key + GUID))
#[inline]
pub fn generate_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(hash)
}

/// Build the upgrade response.
///
/// The response is wire-exact: status line, `Connection`, `Upgrade`,
/// and the accept key, CRLF line endings, no other headers.
pub fn build_response(accept_key: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(128);

    buf.put_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
    buf.put_slice(b"Connection: Upgrade\r\n");
    buf.put_slice(b"Upgrade: websocket\r\n");
    buf.put_slice(b"Sec-WebSocket-Accept: ");
    buf.put_slice(accept_key.as_bytes());
    buf.put_slice(b"\r\n\r\n");

    buf.freeze()
}
