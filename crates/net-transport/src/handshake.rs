//! Plaintext public-key exchange preceding all sealed traffic

use crypto_session::{BoxKey, CryptoError, KeyPair, PUBLIC_KEY_SIZE, PublicKeyBytes};
use shared_protocol::read_full;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::{ChannelConfig, TransportError, TransportResult};

/// Which end of the connection we are
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// We dialed the connection
    Initiator,
    /// We accepted the connection
    Responder,
}

/// Send our public key and receive the peer's, concurrently.
///
/// Each direction carries exactly [`PUBLIC_KEY_SIZE`] raw bytes. Sending and
/// receiving run side by side so two peers that both write first cannot
/// deadlock on a bounded transport buffer.
pub async fn exchange_public_keys<S>(
    stream: &mut S,
    own_public: &PublicKeyBytes,
) -> TransportResult<PublicKeyBytes>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut read_half, mut write_half) = tokio::io::split(stream);

    let send = async {
        write_half
            .write_all(own_public)
            .await
            .map_err(TransportError::HandshakeIo)?;
        write_half.flush().await.map_err(TransportError::HandshakeIo)
    };

    let recv = async {
        let mut peer_public = [0u8; PUBLIC_KEY_SIZE];
        let received = read_full(&mut read_half, &mut peer_public)
            .await
            .map_err(TransportError::HandshakeIo)?;
        if received < PUBLIC_KEY_SIZE {
            return Err(TransportError::HandshakeIncomplete {
                received,
                expected: PUBLIC_KEY_SIZE,
            });
        }
        Ok(peer_public)
    };

    let ((), peer_public) = tokio::try_join!(send, recv)?;
    Ok(peer_public)
}

/// Run the handshake and derive the box key for the connection.
///
/// Rejects a peer that presents our own public key (a reflected handshake)
/// or a low-order key that would make the shared secret predictable.
pub async fn perform_handshake<S>(
    stream: &mut S,
    keypair: &KeyPair,
    role: Role,
    config: &ChannelConfig,
) -> TransportResult<(PublicKeyBytes, BoxKey)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let own_public = keypair.public_key_bytes();
    debug!(?role, "Starting handshake");

    let exchange = exchange_public_keys(stream, &own_public);
    let peer_public = match config.handshake_timeout {
        Some(limit) => tokio::time::timeout(limit, exchange)
            .await
            .map_err(|_| TransportError::HandshakeTimeout)??,
        None => exchange.await?,
    };

    if peer_public == own_public {
        return Err(TransportError::HandshakeRejected(
            "peer presented our own public key".to_string(),
        ));
    }

    let key = BoxKey::derive(keypair, &peer_public).map_err(|e| match e {
        CryptoError::NonContributory => {
            TransportError::HandshakeRejected("peer public key has low order".to_string())
        }
        other => TransportError::Crypto(other),
    })?;

    debug!(?role, "Handshake complete");
    Ok((peer_public, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tokio::io::AsyncReadExt;

    fn keypair(seed: u64) -> KeyPair {
        KeyPair::generate(&mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[tokio::test]
    async fn test_exchange_over_one_byte_transport() {
        // Both sides write before reading; a 1-byte buffer forces interleaving.
        let (mut a, mut b) = tokio::io::duplex(1);
        let alice = keypair(1);
        let bob = keypair(2);
        let alice_public = alice.public_key_bytes();
        let bob_public = bob.public_key_bytes();

        let (from_bob, from_alice) = tokio::join!(
            exchange_public_keys(&mut a, &alice_public),
            exchange_public_keys(&mut b, &bob_public),
        );

        assert_eq!(from_bob.unwrap(), bob_public);
        assert_eq!(from_alice.unwrap(), alice_public);
    }

    #[tokio::test]
    async fn test_both_roles_derive_same_key() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let alice = keypair(1);
        let bob = keypair(2);
        let config = ChannelConfig::default();

        let (initiator, responder) = tokio::join!(
            perform_handshake(&mut a, &alice, Role::Initiator, &config),
            perform_handshake(&mut b, &bob, Role::Responder, &config),
        );
        let (seen_by_alice, alice_key) = initiator.unwrap();
        let (seen_by_bob, bob_key) = responder.unwrap();

        assert_eq!(seen_by_alice, bob.public_key_bytes());
        assert_eq!(seen_by_bob, alice.public_key_bytes());

        let nonce = [4u8; crypto_session::NONCE_SIZE];
        let sealed = alice_key.seal(&nonce, b"ping").unwrap();
        assert_eq!(bob_key.open(&nonce, &sealed).unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_eof_mid_handshake() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let alice = keypair(1);

        let peer = tokio::spawn(async move {
            b.write_all(&[0x55; 10]).await.unwrap();
            // Drain our key so the write side never blocks, then hang up.
            let mut sink = [0u8; PUBLIC_KEY_SIZE];
            b.read_exact(&mut sink).await.unwrap();
            drop(b);
        });

        let result = exchange_public_keys(&mut a, &alice.public_key_bytes()).await;
        peer.await.unwrap();

        assert!(matches!(
            result,
            Err(TransportError::HandshakeIncomplete {
                received: 10,
                expected: PUBLIC_KEY_SIZE
            })
        ));
    }

    #[tokio::test]
    async fn test_reflected_key_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let alice = keypair(1);

        let mirror = tokio::spawn(async move {
            let mut key = [0u8; PUBLIC_KEY_SIZE];
            b.read_exact(&mut key).await.unwrap();
            b.write_all(&key).await.unwrap();
            b
        });

        let result =
            perform_handshake(&mut a, &alice, Role::Initiator, &ChannelConfig::default()).await;
        let _b = mirror.await.unwrap();

        assert!(matches!(result, Err(TransportError::HandshakeRejected(_))));
    }

    #[tokio::test]
    async fn test_low_order_key_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let alice = keypair(1);

        let peer = tokio::spawn(async move {
            b.write_all(&[0u8; PUBLIC_KEY_SIZE]).await.unwrap();
            b
        });

        let result =
            perform_handshake(&mut a, &alice, Role::Initiator, &ChannelConfig::default()).await;
        let _b = peer.await.unwrap();

        assert!(matches!(result, Err(TransportError::HandshakeRejected(_))));
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let (mut a, _b) = tokio::io::duplex(64);
        let alice = keypair(1);
        let config = ChannelConfig {
            handshake_timeout: Some(Duration::from_millis(50)),
            ..Default::default()
        };

        let result = perform_handshake(&mut a, &alice, Role::Initiator, &config).await;
        assert!(matches!(result, Err(TransportError::HandshakeTimeout)));
    }
}
