//! Error types for the wire protocol

use thiserror::Error;

/// Protocol error
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid frame length: {length} bytes (allowed: {min}..={max})")]
    InvalidFrameLength { length: usize, min: usize, max: usize },

    #[error("Truncated frame: expected {expected} bytes, stream ended after {received}")]
    TruncatedFrame { expected: usize, received: usize },

    #[error("Stream closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// True when the peer closed the stream cleanly on a frame boundary
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
