//! Error types for the chat relay

use std::fmt;
use std::io;

use crate::config::ConfigError;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Relay error types
#[derive(Debug)]
pub enum Error {
    /// I/O error from the underlying socket
    Io(io::Error),
    /// Handshake failed (missing or malformed upgrade request)
    Handshake(&'static str),
    /// Invalid HTTP in the upgrade request
    InvalidHttp(&'static str),
    /// Client frame arrived with the mask bit clear
    UnmaskedFrame {
        /// Length the frame header declared
        declared_len: u64,
    },
    /// Frame declares a payload larger than the relay accepts
    FrameTooLarge,
    /// Connection closed by the peer
    ConnectionClosed,
    /// Startup configuration was rejected
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Handshake(msg) => write!(f, "Handshake failed: {}", msg),
            Error::InvalidHttp(msg) => write!(f, "Invalid HTTP: {}", msg),
            Error::UnmaskedFrame { declared_len } => write!(
                f,
                "mask bit not set on client frame (declared length {})",
                declared_len
            ),
            Error::FrameTooLarge => write!(f, "Frame too large"),
            Error::ConnectionClosed => write!(f, "Connection closed"),
            Error::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset => Error::ConnectionClosed,
            io::ErrorKind::BrokenPipe => Error::ConnectionClosed,
            io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(e),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(Error::from(reset), Error::ConnectionClosed));

        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(Error::from(eof), Error::ConnectionClosed));

        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(Error::from(denied), Error::Io(_)));
    }

    #[test]
    fn test_display() {
        let e = Error::UnmaskedFrame { declared_len: 42 };
        assert_eq!(
            e.to_string(),
            "mask bit not set on client frame (declared length 42)"
        );
        assert_eq!(
            Error::Handshake("missing Sec-WebSocket-Key").to_string(),
            "Handshake failed: missing Sec-WebSocket-Key"
        );
    }
}
