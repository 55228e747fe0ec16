//! WebSocket frame codec
//!
//! This module implements the RFC 6455 framing used by the relay:
//! decoding masked client-to-server frames and encoding unmasked
//! server-to-client text frames. Both sides handle the three payload
//! length encodings (7-bit direct, 16-bit extended, 64-bit extended).
//! Pure functions over byte buffers; no I/O, no state.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::mask::apply_mask;
use crate::{MAX_FRAME_PAYLOAD, MEDIUM_PAYLOAD_THRESHOLD, SMALL_PAYLOAD_THRESHOLD};

/// A decoded client frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Final fragment flag
    pub fin: bool,
    /// Raw opcode bits, recorded but not interpreted (the relay carries text only)
    pub opcode: u8,
    /// Payload bytes, already unmasked
    pub payload: Bytes,
}

impl Frame {
    /// Best-effort UTF-8 decode of the payload.
    ///
    /// Invalid sequences are replaced rather than rejected.
    pub fn into_text(self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Decode one client frame from the front of `buf`.
///
/// Returns:
/// - `Ok(Some((frame, consumed)))` if a complete frame was decoded
/// - `Ok(None)` if the buffer does not yet hold a complete frame
/// - `Err(e)` on a protocol violation
///
/// The mask bit must be set on every client frame; a clear bit is
/// unrecoverable (the payload cannot be unmasked) and yields
/// [`Error::UnmaskedFrame`].
pub fn decode_client_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>> {
    if buf.len() < 2 {
        return Ok(None);
    }

    let b0 = buf[0];
    let b1 = buf[1];

    let fin = b0 & 0x80 != 0;
    let opcode = b0 & 0x0F;
    let masked = b1 & 0x80 != 0;
    let len_byte = b1 & 0x7F;

    // Resolve the payload length; `mask_offset` is where the 4-byte key starts.
    let (payload_len, mask_offset) = if len_byte <= 125 {
        (len_byte as u64, 2)
    } else if len_byte == 126 {
        if buf.len() < 4 {
            return Ok(None);
        }
        (u16::from_be_bytes([buf[2], buf[3]]) as u64, 4)
    } else {
        if buf.len() < 10 {
            return Ok(None);
        }
        let len = u64::from_be_bytes([
            buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
        ]);
        (len, 10)
    };

    if !masked {
        return Err(Error::UnmaskedFrame {
            declared_len: payload_len,
        });
    }

    if payload_len > MAX_FRAME_PAYLOAD as u64 {
        return Err(Error::FrameTooLarge);
    }
    let payload_len = payload_len as usize;

    let payload_offset = mask_offset + 4;
    let total = payload_offset + payload_len;
    if buf.len() < total {
        return Ok(None);
    }

    let key = [
        buf[mask_offset],
        buf[mask_offset + 1],
        buf[mask_offset + 2],
        buf[mask_offset + 3],
    ];

    let mut payload = buf[payload_offset..total].to_vec();
    apply_mask(&mut payload, key);

    Ok(Some((
        Frame {
            fin,
            opcode,
            payload: Bytes::from(payload),
        },
        total,
    )))
}

/// Encode a text payload into a single server-to-client frame.
///
/// Server frames are never masked (RFC 6455 §5.1): the header is
/// `0x81` (FIN + text opcode) followed by the length in whichever of
/// the three encodings fits, then the raw UTF-8 bytes. Header and
/// payload are concatenated into one buffer for a single write.
pub fn encode_text_frame(text: &str) -> Bytes {
    let payload = text.as_bytes();
    let len = payload.len();

    let header_size = if len > MEDIUM_PAYLOAD_THRESHOLD {
        10
    } else if len > SMALL_PAYLOAD_THRESHOLD {
        4
    } else {
        2
    };

    let mut buf = BytesMut::with_capacity(header_size + len);
    buf.put_u8(0x81);

    if len <= SMALL_PAYLOAD_THRESHOLD {
        buf.put_u8(len as u8);
    } else if len <= MEDIUM_PAYLOAD_THRESHOLD {
        buf.put_u8(126);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(127);
        buf.put_u64(len as u64);
    }

    buf.put_slice(payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a masked client frame the way a browser would.
    fn client_frame(payload: &[u8], key: [u8; 4]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(0x81);
        let len = payload.len();
        if len <= 125 {
            buf.put_u8(0x80 | len as u8);
        } else if len <= 65535 {
            buf.put_u8(0x80 | 126);
            buf.put_u16(len as u16);
        } else {
            buf.put_u8(0x80 | 127);
            buf.put_u64(len as u64);
        }
        buf.put_slice(&key);
        let start = buf.len();
        buf.put_slice(payload);
        apply_mask(&mut buf[start..], key);
        buf.to_vec()
    }

    #[test]
    fn test_decode_small_masked() {
        let key = [0x37, 0xfa, 0x21, 0x3d];
        let wire = client_frame(b"Hello", key);

        let (frame, consumed) = decode_client_frame(&wire).unwrap().unwrap();
        assert!(frame.fin);
        assert_eq!(frame.opcode, 0x1);
        assert_eq!(frame.payload.as_ref(), b"Hello");
        assert_eq!(consumed, wire.len());
    }

    #[test]
    fn test_decode_length_path_boundaries() {
        // 125 stays on the 7-bit path: mask at offset 2, payload at 6
        let wire = client_frame(&vec![b'a'; 125], [1, 2, 3, 4]);
        assert_eq!(wire[1] & 0x7F, 125);
        let (frame, consumed) = decode_client_frame(&wire).unwrap().unwrap();
        assert_eq!(frame.payload.len(), 125);
        assert_eq!(consumed, 6 + 125);

        // 126 switches to the 16-bit path: mask at offset 4, payload at 8
        let wire = client_frame(&vec![b'b'; 126], [1, 2, 3, 4]);
        assert_eq!(wire[1] & 0x7F, 126);
        let (frame, consumed) = decode_client_frame(&wire).unwrap().unwrap();
        assert_eq!(frame.payload.len(), 126);
        assert_eq!(consumed, 8 + 126);

        // 65536 switches to the 64-bit path: mask at offset 10, payload at 14
        let wire = client_frame(&vec![b'c'; 65536], [1, 2, 3, 4]);
        assert_eq!(wire[1] & 0x7F, 127);
        let (frame, consumed) = decode_client_frame(&wire).unwrap().unwrap();
        assert_eq!(frame.payload.len(), 65536);
        assert_eq!(consumed, 14 + 65536);
        assert!(frame.payload.iter().all(|&b| b == b'c'));
    }

    #[test]
    fn test_decode_incomplete_returns_none() {
        let wire = client_frame(b"incomplete", [9, 9, 9, 9]);
        for cut in 0..wire.len() {
            assert!(decode_client_frame(&wire[..cut]).unwrap().is_none());
        }
        assert!(decode_client_frame(&wire).unwrap().is_some());
    }

    #[test]
    fn test_decode_unmasked_is_violation() {
        // An unmasked text frame, as the server itself would emit
        let wire = encode_text_frame("nope");
        match decode_client_frame(&wire) {
            Err(Error::UnmaskedFrame { declared_len }) => assert_eq!(declared_len, 4),
            other => panic!("expected UnmaskedFrame, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_decode_empty_payload() {
        let wire = client_frame(b"", [5, 6, 7, 8]);
        let (frame, consumed) = decode_client_frame(&wire).unwrap().unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(consumed, 6);
    }

    #[test]
    fn test_decode_oversized_declared_length() {
        let mut wire = vec![0x81, 0x80 | 127];
        wire.extend_from_slice(&(u64::MAX >> 1).to_be_bytes());
        assert!(matches!(
            decode_client_frame(&wire),
            Err(Error::FrameTooLarge)
        ));
    }

    #[test]
    fn test_decode_consecutive_frames() {
        let mut wire = client_frame(b"first", [1, 1, 1, 1]);
        wire.extend_from_slice(&client_frame(b"second", [2, 2, 2, 2]));

        let (frame, consumed) = decode_client_frame(&wire).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"first");

        let (frame, rest) = decode_client_frame(&wire[consumed..]).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"second");
        assert_eq!(consumed + rest, wire.len());
    }

    #[test]
    fn test_encode_small() {
        let frame = encode_text_frame("hello");
        assert_eq!(frame[0], 0x81);
        assert_eq!(frame[1], 0x05);
        assert_eq!(&frame[2..], b"hello");
    }

    #[test]
    fn test_encode_medium() {
        let text = "x".repeat(300);
        let frame = encode_text_frame(&text);
        assert_eq!(frame[0], 0x81);
        assert_eq!(frame[1], 126);
        assert_eq!(u16::from_be_bytes([frame[2], frame[3]]), 300);
        assert_eq!(frame.len(), 4 + 300);
    }

    #[test]
    fn test_encode_large_selects_64bit_length() {
        let text = "y".repeat(70_000);
        let frame = encode_text_frame(&text);
        assert_eq!(frame[0], 0x81);
        assert_eq!(frame[1], 127);
        let declared = u64::from_be_bytes([
            frame[2], frame[3], frame[4], frame[5], frame[6], frame[7], frame[8], frame[9],
        ]);
        assert_eq!(declared, 70_000);
        assert_eq!(frame.len(), 10 + 70_000);
    }

    #[test]
    fn test_encode_boundary_lengths() {
        // 125 is the last direct length, 126 the first extended one
        assert_eq!(encode_text_frame(&"a".repeat(125))[1], 125);
        assert_eq!(encode_text_frame(&"a".repeat(126))[1], 126);
        assert_eq!(encode_text_frame(&"a".repeat(65535))[1], 126);
        assert_eq!(encode_text_frame(&"a".repeat(65536))[1], 127);
    }

    #[test]
    fn test_into_text_lossy() {
        let frame = Frame {
            fin: true,
            opcode: 0x1,
            payload: Bytes::from_static(&[0x68, 0x69, 0xff]),
        };
        assert_eq!(frame.into_text(), "hi\u{fffd}");
    }
}
