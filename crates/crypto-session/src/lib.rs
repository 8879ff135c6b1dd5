//! Crypto Session - public-key authenticated encryption for Sealbox
//!
//! Provides X25519 key pairs and the NaCl box (XSalsa20Poly1305) used to
//! seal every frame on a sealed channel.

mod error;
mod keys;
mod sealing;

pub use error::*;
pub use keys::*;
pub use sealing::*;

pub use shared_protocol::{NONCE_SIZE, PUBLIC_KEY_SIZE, TAG_SIZE};

/// Private key size (256 bits / 32 bytes)
pub const SECRET_KEY_SIZE: usize = 32;
