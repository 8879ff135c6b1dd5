//! Sealbox secure echo
//!
//! # Usage
//!
//! ```bash
//! # Serve on port 9000
//! secure-echo -l 9000
//!
//! # Send one message and print the echoed reply
//! secure-echo 9000 "hello world"
//! ```

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use net_transport::ChannelConfig;
use shared_protocol::DEFAULT_MAX_FRAME_SIZE;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Echo messages over a sealed channel
#[derive(Parser, Debug)]
#[command(name = "secure-echo")]
#[command(version)]
struct Args {
    /// Listen mode: serve on this port
    #[arg(short = 'l', long = "listen", value_name = "PORT")]
    listen: Option<u16>,

    /// Port of the server to connect to (client mode)
    #[arg(required_unless_present = "listen", conflicts_with = "listen")]
    port: Option<u16>,

    /// Message to send (client mode)
    #[arg(required_unless_present = "listen", conflicts_with = "listen")]
    message: Option<String>,

    /// Host to connect to (client mode)
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Largest frame accepted or sent, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,

    /// Seconds allowed for the key exchange (0 waits forever)
    #[arg(long, default_value_t = 10)]
    handshake_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            max_frame_size: self.max_frame_size,
            handshake_timeout: match self.handshake_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries only the echoed reply.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = args.channel_config();
    config.validate()?;

    match (args.listen, args.port, args.message.as_deref()) {
        (Some(port), _, _) => run_server(port, config).await,
        (None, Some(port), Some(message)) => run_client(&args.host, port, message, config).await,
        _ => anyhow::bail!("either -l <PORT> or <PORT> <MESSAGE> is required"),
    }
}

async fn run_server(port: u16, config: ChannelConfig) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to listen on port {}", port))?;

    info!("Starting secure echo server");

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
        }
    };
    net_transport::serve_with_shutdown(listener, config, shutdown).await?;
    Ok(())
}

async fn run_client(
    host: &str,
    port: u16,
    message: &str,
    config: ChannelConfig,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let mut channel = net_transport::dial(&addr, &config).await?;

    channel.send(message.as_bytes()).await?;
    let mut buf = vec![0u8; message.len()];
    let n = channel.read(&mut buf).await?;
    channel.close().await?;

    println!("{}", String::from_utf8_lossy(&buf[..n]));
    Ok(())
}
