//! Sealing half of a channel

use crypto_session::{BoxKey, generate_nonce};
use futures::SinkExt;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use shared_protocol::{Frame, FrameCodec, max_message_len};
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::{debug, warn};

use crate::{TransportError, TransportResult};

/// Turns plaintext messages into sealed frames on a byte stream.
///
/// Every message is sealed under a fresh random nonce drawn from `R`. A
/// failed frame write leaves the peer's framing out of step, so the writer
/// refuses all further sends once that happens.
pub struct SealedWriter<W, R = OsRng> {
    framed: FramedWrite<W, FrameCodec>,
    key: BoxKey,
    rng: R,
    frames_sent: u64,
    broken: bool,
}

impl<W, R> SealedWriter<W, R>
where
    W: AsyncWrite + Unpin,
    R: RngCore + CryptoRng,
{
    pub fn new(inner: W, key: BoxKey, rng: R, max_frame_size: usize) -> Self {
        Self {
            framed: FramedWrite::new(inner, FrameCodec::new(max_frame_size)),
            key,
            rng,
            frames_sent: 0,
            broken: false,
        }
    }

    /// Seal `message` and write it as one frame.
    ///
    /// Returns the number of plaintext bytes sent, which is always
    /// `message.len()` on success.
    pub async fn send(&mut self, message: &[u8]) -> TransportResult<usize> {
        if self.broken {
            return Err(TransportError::ChannelBroken);
        }

        let max = max_message_len(self.framed.encoder().max_frame_size());
        if message.len() > max {
            return Err(TransportError::MessageTooLarge {
                size: message.len(),
                max,
            });
        }

        match self.seal_and_write(message).await {
            Ok(()) => {
                self.frames_sent += 1;
                Ok(message.len())
            }
            Err(e) => {
                warn!(error = %e, "Sealed write failed, writer closed");
                self.broken = true;
                Err(e)
            }
        }
    }

    async fn seal_and_write(&mut self, message: &[u8]) -> TransportResult<()> {
        let nonce = generate_nonce(&mut self.rng)?;
        let sealed = self.key.seal(&nonce, message)?;
        self.framed.send(Frame::new(nonce, sealed)).await?;
        debug!(len = message.len(), "Sealed message sent");
        Ok(())
    }

    /// Flush anything pending and shut down the underlying write side
    pub async fn shutdown(&mut self) -> TransportResult<()> {
        self.broken = true;
        self.framed.close().await?;
        Ok(())
    }

    /// Number of frames written so far
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    pub fn get_ref(&self) -> &W {
        self.framed.get_ref()
    }

    pub fn into_inner(self) -> W {
        self.framed.into_inner()
    }
}
