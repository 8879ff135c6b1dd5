//! Network Transport - sealed message channels for Sealbox
//!
//! Runs the plaintext public-key handshake over a byte stream, then carries
//! length-delimited frames sealed with the derived box key. `dial` and
//! `serve` bind the channel to TCP.

mod channel;
mod client;
mod config;
mod error;
mod handshake;
mod reader;
mod server;
mod writer;

use std::time::Duration;

pub use channel::*;
pub use client::*;
pub use config::*;
pub use error::*;
pub use handshake::*;
pub use reader::*;
pub use server::*;
pub use writer::*;

pub use crypto_session::{KeyPair, PublicKeyBytes};

/// Default upper bound on the public-key exchange
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
