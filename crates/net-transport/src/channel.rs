//! Duplex sealed channel over one byte stream

use bytes::Bytes;
use crypto_session::{KeyPair, PublicKeyBytes};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tracing::info;

use crate::{ChannelConfig, Role, SealedReader, SealedWriter, TransportResult, perform_handshake};

/// A handshaken connection exposing message-level send and receive.
///
/// Messages arrive in the order they were sent, one frame per message.
pub struct SecureChannel<S, R = OsRng> {
    reader: SealedReader<ReadHalf<S>>,
    writer: SealedWriter<WriteHalf<S>, R>,
    local_public_key: PublicKeyBytes,
    peer_public_key: PublicKeyBytes,
}

impl<S> SecureChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Handshake over `stream` and wrap it, drawing nonces from the OS
    pub async fn establish(
        stream: S,
        keypair: &KeyPair,
        role: Role,
        config: &ChannelConfig,
    ) -> TransportResult<Self> {
        Self::establish_with_rng(stream, keypair, role, config, OsRng).await
    }
}

impl<S, R> SecureChannel<S, R>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: RngCore + CryptoRng,
{
    /// Handshake over `stream` and wrap it, drawing nonces from `rng`
    pub async fn establish_with_rng(
        mut stream: S,
        keypair: &KeyPair,
        role: Role,
        config: &ChannelConfig,
        rng: R,
    ) -> TransportResult<Self> {
        config.validate()?;

        let (peer_public_key, key) = perform_handshake(&mut stream, keypair, role, config).await?;
        let (read_half, write_half) = tokio::io::split(stream);

        info!(?role, "Secure channel established");

        Ok(Self {
            reader: SealedReader::new(read_half, key.clone(), config.max_frame_size),
            writer: SealedWriter::new(write_half, key, rng, config.max_frame_size),
            local_public_key: keypair.public_key_bytes(),
            peer_public_key,
        })
    }

    /// Seal and send one message
    pub async fn send(&mut self, message: &[u8]) -> TransportResult<usize> {
        self.writer.send(message).await
    }

    /// Receive and open the next message
    pub async fn recv(&mut self) -> TransportResult<Bytes> {
        self.reader.recv().await
    }

    /// Receive the next message into `buf`
    pub async fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        self.reader.read(buf).await
    }

    /// Shut down our write side; the peer sees a clean end of stream
    pub async fn close(&mut self) -> TransportResult<()> {
        self.writer.shutdown().await
    }

    pub fn local_public_key(&self) -> &PublicKeyBytes {
        &self.local_public_key
    }

    /// Public key learned during the handshake
    pub fn peer_public_key(&self) -> &PublicKeyBytes {
        &self.peer_public_key
    }

    pub fn frames_sent(&self) -> u64 {
        self.writer.frames_sent()
    }

    pub fn frames_received(&self) -> u64 {
        self.reader.frames_received()
    }

    /// Split into halves that can be driven from separate tasks
    pub fn into_split(self) -> (SealedReader<ReadHalf<S>>, SealedWriter<WriteHalf<S>, R>) {
        (self.reader, self.writer)
    }
}
