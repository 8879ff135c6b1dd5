//! Client side: connect, handshake, hand back a ready channel

use crypto_session::KeyPair;
use tokio::net::TcpStream;
use tracing::info;

use crate::{ChannelConfig, Role, SecureChannel, TransportError, TransportResult};

/// A sealed channel over TCP
pub type TcpChannel = SecureChannel<TcpStream>;

/// Connect to `addr`, generate a fresh key pair, and run the handshake as
/// the initiating side.
///
/// Any failure along the way is wrapped in [`TransportError::Dial`].
pub async fn dial(addr: &str, config: &ChannelConfig) -> TransportResult<TcpChannel> {
    connect_and_handshake(addr, config)
        .await
        .map_err(|e| TransportError::Dial {
            addr: addr.to_string(),
            source: Box::new(e),
        })
}

async fn connect_and_handshake(addr: &str, config: &ChannelConfig) -> TransportResult<TcpChannel> {
    config.validate()?;
    let keypair = KeyPair::generate_os()?;

    info!("Connecting to {}", addr);
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;

    SecureChannel::establish(stream, &keypair, Role::Initiator, config).await
}
