//! Transport error types

use crypto_session::CryptoError;
use shared_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Handshake incomplete: received {received} of {expected} key bytes")]
    HandshakeIncomplete { received: usize, expected: usize },

    #[error("Handshake I/O failed: {0}")]
    HandshakeIo(#[source] std::io::Error),

    #[error("Handshake timeout")]
    HandshakeTimeout,

    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Receive buffer too small: message is {needed} bytes, buffer holds {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Channel broken by an earlier failure")]
    ChannelBroken,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dial {addr} failed: {source}")]
    Dial {
        addr: String,
        #[source]
        source: Box<TransportError>,
    },

    #[error("Listener failed: {0}")]
    Listener(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Peer closed the connection cleanly between frames
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_closed())
    }

    /// A sealed payload failed verification
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::AuthenticationFailed))
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
