//! Channel configuration

use std::time::Duration;

use shared_protocol::{DEFAULT_MAX_FRAME_SIZE, MIN_FRAME_LEN, max_message_len};

use crate::{DEFAULT_HANDSHAKE_TIMEOUT, TransportError, TransportResult};

/// Settings shared by both ends of a sealed channel.
///
/// Peers must agree on `max_frame_size`; a frame above the receiver's limit
/// is a fatal framing error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Largest frame body (nonce + ciphertext + tag) accepted or produced
    pub max_frame_size: usize,
    /// Upper bound on the public-key exchange; `None` waits indefinitely
    pub handshake_timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
        }
    }
}

impl ChannelConfig {
    pub fn validate(&self) -> TransportResult<()> {
        if self.max_frame_size < MIN_FRAME_LEN {
            return Err(TransportError::InvalidConfig(format!(
                "max_frame_size {} is below the minimum frame of {} bytes",
                self.max_frame_size, MIN_FRAME_LEN
            )));
        }
        if self.max_frame_size > u32::MAX as usize {
            return Err(TransportError::InvalidConfig(format!(
                "max_frame_size {} does not fit the 32-bit length prefix",
                self.max_frame_size
            )));
        }
        if self.handshake_timeout == Some(Duration::ZERO) {
            return Err(TransportError::InvalidConfig(
                "handshake_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Largest plaintext message a channel with this config can carry
    pub fn max_message_len(&self) -> usize {
        max_message_len(self.max_frame_size)
    }
}
