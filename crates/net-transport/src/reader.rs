//! Opening half of a channel

use bytes::Bytes;
use crypto_session::BoxKey;
use futures::StreamExt;
use shared_protocol::{FrameCodec, ProtocolError};
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::{TransportError, TransportResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Open,
    /// Peer closed cleanly between frames
    Closed,
    /// A frame failed to parse or verify
    Broken,
}

/// Turns sealed frames from a byte stream back into verified plaintext.
///
/// Fail-closed: after any framing, authentication, or I/O failure the
/// stream position can no longer be trusted, and every later read returns
/// [`TransportError::ChannelBroken`].
pub struct SealedReader<Rd> {
    framed: FramedRead<Rd, FrameCodec>,
    key: BoxKey,
    frames_received: u64,
    state: ReadState,
}

impl<Rd> SealedReader<Rd>
where
    Rd: AsyncRead + Unpin,
{
    pub fn new(inner: Rd, key: BoxKey, max_frame_size: usize) -> Self {
        Self {
            framed: FramedRead::new(inner, FrameCodec::new(max_frame_size)),
            key,
            frames_received: 0,
            state: ReadState::Open,
        }
    }

    /// Read and open the next message
    pub async fn recv(&mut self) -> TransportResult<Bytes> {
        match self.state {
            ReadState::Open => {}
            ReadState::Closed => return Err(ProtocolError::Closed.into()),
            ReadState::Broken => return Err(TransportError::ChannelBroken),
        }

        match self.read_and_open().await {
            Ok(message) => {
                self.frames_received += 1;
                Ok(message)
            }
            Err(e) if e.is_closed() => {
                debug!("Peer closed the channel");
                self.state = ReadState::Closed;
                Err(e)
            }
            Err(e) => {
                if e.is_authentication_failure() {
                    warn!("Frame failed authentication, reader closed");
                } else {
                    warn!(error = %e, "Sealed read failed, reader closed");
                }
                self.state = ReadState::Broken;
                Err(e)
            }
        }
    }

    async fn read_and_open(&mut self) -> TransportResult<Bytes> {
        let frame = match self.framed.next().await {
            Some(frame) => frame?,
            None => return Err(ProtocolError::Closed.into()),
        };
        let message = self.key.open(&frame.nonce, &frame.sealed)?;
        debug!(len = message.len(), "Sealed message received");
        Ok(Bytes::from(message))
    }

    /// Read the next message into `buf`, returning its length.
    ///
    /// A message longer than `buf` has already been consumed from the
    /// stream, so `BufferTooSmall` breaks the reader like any other failure.
    pub async fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        let message = self.recv().await?;
        if message.len() > buf.len() {
            self.state = ReadState::Broken;
            return Err(TransportError::BufferTooSmall {
                needed: message.len(),
                capacity: buf.len(),
            });
        }
        buf[..message.len()].copy_from_slice(&message);
        Ok(message.len())
    }

    /// Number of frames opened so far
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn is_broken(&self) -> bool {
        self.state == ReadState::Broken
    }

    /// Release the transport; bytes already buffered past the last frame are dropped
    pub fn into_inner(self) -> Rd {
        self.framed.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto_session::{CryptoError, KeyPair};
    use rand::SeedableRng;
    use rand::rngs::{OsRng, StdRng};
    use shared_protocol::DEFAULT_MAX_FRAME_SIZE;

    use crate::SealedWriter;

    fn keypair(seed: u64) -> KeyPair {
        KeyPair::generate(&mut StdRng::seed_from_u64(seed)).unwrap()
    }

    /// Seal `messages` from alice to bob and return the raw wire bytes
    async fn sealed_wire(messages: &[&[u8]]) -> Vec<u8> {
        let key = BoxKey::derive(&keypair(1), &keypair(2).public_key_bytes()).unwrap();
        let mut writer = SealedWriter::new(Vec::new(), key, OsRng, DEFAULT_MAX_FRAME_SIZE);
        for message in messages {
            writer.send(message).await.unwrap();
        }
        writer.into_inner()
    }

    fn bob_reader(wire: &[u8]) -> SealedReader<&[u8]> {
        let key = BoxKey::derive(&keypair(2), &keypair(1).public_key_bytes()).unwrap();
        SealedReader::new(wire, key, DEFAULT_MAX_FRAME_SIZE)
    }

    #[tokio::test]
    async fn test_reads_what_was_written() {
        let wire = sealed_wire(&[b"one", b"", b"three"]).await;
        let mut reader = bob_reader(&wire);

        assert_eq!(&reader.recv().await.unwrap()[..], b"one");
        assert_eq!(&reader.recv().await.unwrap()[..], b"");
        assert_eq!(&reader.recv().await.unwrap()[..], b"three");
        assert!(reader.recv().await.unwrap_err().is_closed());
        assert_eq!(reader.frames_received(), 3);
    }

    #[tokio::test]
    async fn test_wrong_peer_public_key() {
        let wire = sealed_wire(&[b"secret"]).await;
        let key = BoxKey::derive(&keypair(2), &keypair(3).public_key_bytes()).unwrap();
        let mut reader = SealedReader::new(wire.as_slice(), key, DEFAULT_MAX_FRAME_SIZE);

        let err = reader.recv().await.unwrap_err();
        assert!(err.is_authentication_failure());
    }

    #[tokio::test]
    async fn test_wrong_own_private_key() {
        let wire = sealed_wire(&[b"secret"]).await;
        let key = BoxKey::derive(&keypair(3), &keypair(1).public_key_bytes()).unwrap();
        let mut reader = SealedReader::new(wire.as_slice(), key, DEFAULT_MAX_FRAME_SIZE);

        assert!(matches!(
            reader.recv().await,
            Err(TransportError::Crypto(CryptoError::AuthenticationFailed))
        ));
    }

    #[tokio::test]
    async fn test_flipped_tag_byte_closes_reader() {
        let first = sealed_wire(&[b"tampered"]).await;
        let frame_len = first.len();
        let mut wire = sealed_wire(&[b"tampered", b"never read"]).await;
        wire[frame_len - 1] ^= 0x01;

        let mut reader = bob_reader(&wire);
        assert!(reader.recv().await.unwrap_err().is_authentication_failure());
        assert!(reader.is_broken());

        // The intact second frame must not be parsed after the failure.
        assert!(matches!(
            reader.recv().await,
            Err(TransportError::ChannelBroken)
        ));
        assert_eq!(reader.frames_received(), 0);
    }

    #[tokio::test]
    async fn test_oversized_length_prefix() {
        let mut wire = sealed_wire(&[b"hi"]).await;
        wire[..4].copy_from_slice(&u32::MAX.to_be_bytes());

        let mut reader = bob_reader(&wire);
        assert!(matches!(
            reader.recv().await,
            Err(TransportError::Protocol(ProtocolError::InvalidFrameLength { .. }))
        ));
        assert!(reader.is_broken());
    }

    #[tokio::test]
    async fn test_truncated_stream() {
        let wire = sealed_wire(&[b"cut short"]).await;
        let mut reader = bob_reader(&wire[..wire.len() - 1]);

        assert!(matches!(
            reader.recv().await,
            Err(TransportError::Protocol(ProtocolError::TruncatedFrame { .. }))
        ));
    }

    #[tokio::test]
    async fn test_buffer_too_small_is_fatal() {
        let wire = sealed_wire(&[b"hello", b"world"]).await;
        let mut reader = bob_reader(&wire);

        let mut small = [0u8; 4];
        assert!(matches!(
            reader.read(&mut small).await,
            Err(TransportError::BufferTooSmall {
                needed: 5,
                capacity: 4
            })
        ));

        let mut big = [0u8; 16];
        assert!(matches!(
            reader.read(&mut big).await,
            Err(TransportError::ChannelBroken)
        ));
    }

    #[tokio::test]
    async fn test_read_into_exact_buffer() {
        let wire = sealed_wire(&[b"hello"]).await;
        let mut reader = bob_reader(&wire);

        let mut buf = [0u8; 5];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }
}
