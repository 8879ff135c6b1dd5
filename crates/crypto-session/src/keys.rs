//! Ephemeral X25519 key pairs

use std::fmt;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoResult, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};

/// Raw public key as exchanged during the handshake
pub type PublicKeyBytes = [u8; PUBLIC_KEY_SIZE];

/// Key pair owned by one end of a connection.
///
/// The secret half is zeroized on drop and never leaves this type except
/// through [`KeyPair::secret_key_bytes`].
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair from the given random source
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> CryptoResult<Self> {
        let mut bytes = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
        rng.try_fill_bytes(bytes.as_mut())
            .map_err(|e| CryptoError::RandomSource(e.to_string()))?;
        Ok(Self::from_secret_bytes(*bytes))
    }

    /// Generate a new key pair from the operating system's random source
    pub fn generate_os() -> CryptoResult<Self> {
        Self::generate(&mut OsRng)
    }

    /// Rebuild a key pair from raw secret key material
    pub fn from_secret_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Get the public key bytes
    pub fn public_key_bytes(&self) -> PublicKeyBytes {
        *self.public.as_bytes()
    }

    /// Copy of the secret key bytes, wiped when dropped
    pub fn secret_key_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_SIZE]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// Perform Diffie-Hellman key agreement with a peer public key
    pub(crate) fn diffie_hellman(&self, their_public: &PublicKeyBytes) -> SharedSecret {
        let their_public = PublicKey::from(*their_public);
        self.secret.diffie_hellman(&their_public)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", self.public.as_bytes())
            .finish_non_exhaustive()
    }
}
