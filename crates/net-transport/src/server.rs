//! Server side: accept loop with one echo task per connection

use std::future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crypto_session::KeyPair;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::{ChannelConfig, Role, SecureChannel, TransportError, TransportResult};

/// Pause before accepting again after running out of descriptors or memory
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Run a secure echo server on `listener` until the listener fails.
pub async fn serve(listener: TcpListener, config: ChannelConfig) -> TransportResult<()> {
    serve_with_shutdown(listener, config, future::pending()).await
}

/// Like [`serve`], but also returns `Ok(())` once `shutdown` resolves.
///
/// Connections already being served keep running in their own tasks.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    config: ChannelConfig,
    shutdown: F,
) -> TransportResult<()>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    let config = Arc::new(config);
    let mut next_id: u64 = 0;

    match listener.local_addr() {
        Ok(addr) => info!("Serving on {}", addr),
        Err(e) => warn!("Serving on unknown address: {}", e),
    }

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, accept loop stopped");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    next_id += 1;
                    let id = next_id;
                    let config = Arc::clone(&config);
                    tokio::spawn(async move {
                        handle_connection(id, stream, peer, &config).await;
                    });
                }
                Err(e) => match classify_accept_error(&e) {
                    AcceptFailure::Connection => {
                        warn!("Accept failed for one connection: {}", e);
                    }
                    AcceptFailure::Resources => {
                        warn!("Accept failed, backing off for {:?}: {}", ACCEPT_BACKOFF, e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                    AcceptFailure::Listener => {
                        error!("Listener failed: {}", e);
                        return Err(TransportError::Listener(e));
                    }
                },
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptFailure {
    /// Concerns a single pending connection
    Connection,
    /// Out of file descriptors or memory; clears as connections close
    Resources,
    /// The listener itself is unusable
    Listener,
}

fn classify_accept_error(e: &io::Error) -> AcceptFailure {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => AcceptFailure::Connection,
        io::ErrorKind::OutOfMemory => AcceptFailure::Resources,
        _ if is_descriptor_exhaustion(e) => AcceptFailure::Resources,
        _ => AcceptFailure::Listener,
    }
}

#[cfg(unix)]
fn is_descriptor_exhaustion(e: &io::Error) -> bool {
    // ENFILE, EMFILE
    matches!(e.raw_os_error(), Some(23 | 24))
}

#[cfg(windows)]
fn is_descriptor_exhaustion(e: &io::Error) -> bool {
    // WSAEMFILE
    e.raw_os_error() == Some(10024)
}

#[cfg(not(any(unix, windows)))]
fn is_descriptor_exhaustion(_e: &io::Error) -> bool {
    false
}

async fn handle_connection(id: u64, stream: TcpStream, peer: SocketAddr, config: &ChannelConfig) {
    info!(connection = id, %peer, "Connection accepted");
    if let Err(e) = stream.set_nodelay(true) {
        debug!(connection = id, "Could not set TCP_NODELAY: {}", e);
    }

    match echo_connection(stream, config).await {
        Ok(echoed) => info!(connection = id, %peer, echoed, "Connection closed"),
        Err(e) => warn!(connection = id, %peer, error = %e, "Connection failed"),
    }
}

/// Serve one connection as the responding side: handshake, then echo every
/// message back until the peer closes or a read fails.
///
/// Returns the number of messages echoed. The connection is shut down
/// before returning in every case.
pub async fn echo_connection<S>(stream: S, config: &ChannelConfig) -> TransportResult<u64>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let keypair = KeyPair::generate_os()?;
    let mut channel = SecureChannel::establish(stream, &keypair, Role::Responder, config).await?;

    let mut echoed = 0;
    let result = loop {
        let message = match channel.recv().await {
            Ok(message) => message,
            Err(e) if e.is_closed() => break Ok(echoed),
            Err(e) => break Err(e),
        };
        if let Err(e) = channel.send(&message).await {
            break Err(e);
        }
        echoed += 1;
    };

    if let Err(e) = channel.close().await {
        debug!("Shutdown after echo loop failed: {}", e);
    }
    result
}
