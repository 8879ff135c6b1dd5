//! NaCl box construction: X25519 + XSalsa20Poly1305

use std::fmt;
use std::sync::Arc;

use crypto_box::aead::Aead;
use crypto_box::aead::generic_array::GenericArray;
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::{CryptoError, CryptoResult, KeyPair, NONCE_SIZE, PublicKeyBytes, TAG_SIZE};

/// Precomputed box shared by the two ends of a connection.
///
/// Equivalent to NaCl's `crypto_box_beforenm`: the X25519 secret is run
/// through HSalsa20 once, and both peers end up with the same key.
#[derive(Clone)]
pub struct BoxKey {
    inner: Arc<SalsaBox>,
}

impl BoxKey {
    /// Precompute the box for traffic between `own` and the holder of `peer_public`
    pub fn derive(own: &KeyPair, peer_public: &PublicKeyBytes) -> CryptoResult<Self> {
        if !own.diffie_hellman(peer_public).was_contributory() {
            return Err(CryptoError::NonContributory);
        }

        let secret = SecretKey::from(*own.secret_key_bytes());
        let inner = SalsaBox::new(&PublicKey::from(*peer_public), &secret);

        debug!("Box key derived");
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Encrypt and authenticate `plaintext`
    ///
    /// Returns: [16-byte auth tag][ciphertext], as `crypto_box_easy` lays it out
    pub fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        self.inner
            .encrypt(GenericArray::from_slice(nonce), plaintext)
            .map_err(|e| CryptoError::Encryption(e.to_string()))
    }

    /// Verify and decrypt a sealed payload.
    ///
    /// No plaintext is returned unless the tag verifies.
    pub fn open(&self, nonce: &[u8; NONCE_SIZE], sealed: &[u8]) -> CryptoResult<Vec<u8>> {
        if sealed.len() < TAG_SIZE {
            return Err(CryptoError::AuthenticationFailed);
        }

        self.inner
            .decrypt(GenericArray::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

impl fmt::Debug for BoxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BoxKey(..)")
    }
}

/// Draw a fresh nonce for one sealed message
pub fn generate_nonce<R: RngCore + CryptoRng>(rng: &mut R) -> CryptoResult<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.try_fill_bytes(&mut nonce)
        .map_err(|e| CryptoError::RandomSource(e.to_string()))?;
    Ok(nonce)
}
