//! Signalbox relay server binary.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default multiplayer port
//! signalbox-server
//!
//! # Custom port, shorter election grace period
//! signalbox-server 30001 --grace-secs 3
//! ```

use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use clap::Parser;
use signalbox_server::{DEFAULT_PORT, RelayConfig, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Signalbox multiplayer relay
#[derive(Parser, Debug)]
#[command(name = "signalbox-server")]
#[command(about = "Multiplayer session relay for train simulation clients")]
#[command(version)]
struct Args {
    /// TCP port to listen on
    #[arg(default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,

    /// Seconds to wait for a dispatcher claim before appointing one
    #[arg(long, default_value = "5")]
    grace_secs: u64,

    /// Seconds before a stalled write to a participant is abandoned
    #[arg(long, default_value = "10")]
    write_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Signalbox relay starting");

    let config = ServerRuntimeConfig {
        bind_address: SocketAddr::new(args.host, args.port).to_string(),
        relay: RelayConfig {
            grace_period: Duration::from_secs(args.grace_secs),
            write_timeout: Duration::from_secs(args.write_timeout_secs),
            ..RelayConfig::default()
        },
    };

    tracing::info!("Binding to {}", config.bind_address);
    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Shutting down");
        },
    }

    Ok(())
}
