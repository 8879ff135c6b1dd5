//! Shared Protocol Definitions for Sealbox
//!
//! Wire constants and the length-delimited frame format shared by every
//! layer of the sealed channel.

mod error;
mod frame;

pub use error::*;
pub use frame::*;

/// X25519 public key size (256 bits / 32 bytes)
pub const PUBLIC_KEY_SIZE: usize = 32;

/// XSalsa20Poly1305 nonce size (192 bits / 24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;

/// Size of the big-endian length prefix in front of every frame
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Smallest frame body that can carry a nonce and a tag (empty message)
pub const MIN_FRAME_LEN: usize = NONCE_SIZE + TAG_SIZE;

/// Default upper bound on a frame body (length prefix excluded)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1 << 20;

/// Largest plaintext that fits in a frame of `max_frame_size` bytes
pub const fn max_message_len(max_frame_size: usize) -> usize {
    max_frame_size.saturating_sub(MIN_FRAME_LEN)
}
