//! Crypto session error types

use thiserror::Error;

/// Cryptographic operation error
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Random source unavailable: {0}")]
    RandomSource(String),

    #[error("Key exchange failed: {0}")]
    KeyExchange(String),

    #[error("Key exchange produced a non-contributory shared secret")]
    NonContributory,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Authentication failed: sealed payload did not verify")]
    AuthenticationFailed,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
