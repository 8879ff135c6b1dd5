//! Length-delimited frames carrying one sealed message each
//!
//! Wire layout: `[u32 BE length][24-byte nonce][16-byte tag || ciphertext]`,
//! where `length` covers the nonce and the sealed payload.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::{LENGTH_PREFIX_SIZE, MIN_FRAME_LEN, NONCE_SIZE, ProtocolError, ProtocolResult};

/// One decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Nonce the payload was sealed under
    pub nonce: [u8; NONCE_SIZE],
    /// Sealed payload, authentication tag included
    pub sealed: Bytes,
}

impl Frame {
    pub fn new(nonce: [u8; NONCE_SIZE], sealed: impl Into<Bytes>) -> Self {
        Self {
            nonce,
            sealed: sealed.into(),
        }
    }

    /// Value carried in the length prefix
    pub fn body_len(&self) -> usize {
        NONCE_SIZE + self.sealed.len()
    }
}

/// Codec for sealed frames, for use with `FramedRead` / `FramedWrite`.
///
/// A length prefix outside `MIN_FRAME_LEN..=max_frame_size` is rejected as
/// soon as its four bytes arrive, before any space is reserved for the body.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    fn check_length(&self, length: usize) -> ProtocolResult<()> {
        if length < MIN_FRAME_LEN || length > self.max_frame_size {
            return Err(ProtocolError::InvalidFrameLength {
                length,
                min: MIN_FRAME_LEN,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

fn peek_length(src: &[u8]) -> usize {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&src[..LENGTH_PREFIX_SIZE]);
    u32::from_be_bytes(prefix) as usize
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> ProtocolResult<Option<Frame>> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let length = peek_length(src);
        self.check_length(length)?;

        if src.len() < LENGTH_PREFIX_SIZE + length {
            src.reserve(LENGTH_PREFIX_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        let mut body = src.split_to(length).freeze();
        let sealed = body.split_off(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&body);

        trace!(length, "Frame received");
        Ok(Some(Frame { nonce, sealed }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> ProtocolResult<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }

        let (expected, received) = if src.len() < LENGTH_PREFIX_SIZE {
            (LENGTH_PREFIX_SIZE, src.len())
        } else {
            (peek_length(src), src.len() - LENGTH_PREFIX_SIZE)
        };
        Err(ProtocolError::TruncatedFrame { expected, received })
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> ProtocolResult<()> {
        let length = frame.body_len();
        self.check_length(length)?;
        let prefix = u32::try_from(length).map_err(|_| ProtocolError::InvalidFrameLength {
            length,
            min: MIN_FRAME_LEN,
            max: u32::MAX as usize,
        })?;

        dst.reserve(LENGTH_PREFIX_SIZE + length);
        dst.put_u32(prefix);
        dst.put_slice(&frame.nonce);
        dst.put_slice(&frame.sealed);
        trace!(length, "Frame sent");
        Ok(())
    }
}

/// Fill `buf` from `reader`, looping over short reads.
///
/// Returns the number of bytes read, which is less than `buf.len()` only
/// when the stream reached EOF.
pub async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
