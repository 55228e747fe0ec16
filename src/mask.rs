//! WebSocket frame masking
//!
//! Client-to-server payloads are XORed with a repeating 4-byte key
//! (RFC 6455 §5.3). The operation is its own inverse, so the same
//! function serves masking and unmasking.

/// Apply a WebSocket mask in place.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}
