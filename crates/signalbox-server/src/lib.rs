//! Signalbox relay server.
//!
//! Lets several train-simulation clients share one live multiplayer session.
//! The relay learns each participant's name from an in-band handshake, keeps
//! one participant designated as dispatcher, and otherwise forwards opaque
//! traffic from each participant to all the others.
//!
//! # Architecture
//!
//! [`Server`] accepts connections from a [`Listener`] and hands each one to
//! the shared [`Relay`], which runs a two-task pipeline per connection (socket
//! reader feeding a relay loop). All membership state lives in one
//! [`ParticipantRegistry`] behind the relay's lock.
//!
//! # Components
//!
//! - [`Server`]: acceptor loop
//! - [`Relay`]: shared core (admission, handshake, relay, teardown, failover)
//! - [`ParticipantRegistry`]: names, dispatcher pointer, election state
//! - [`Outbound`] with [`sender::unicast`] and [`sender::broadcast`]: writes
//!   with per-recipient timeouts
//! - [`TcpTransport`]: production TCP listener

mod config;
mod error;
mod failover;
mod pipeline;
mod registry;
mod relay;
pub mod sender;
mod transport;

use std::{io, net::SocketAddr, sync::Arc};

pub use config::{DEFAULT_PORT, RelayConfig, ServerRuntimeConfig};
pub use error::{SendError, ServerError};
pub use registry::{Admission, ParticipantRegistry, RegistryError, Removal};
pub use relay::Relay;
pub use sender::Outbound;
pub use transport::{Listener, TcpTransport};

/// Production relay server.
pub struct Server<L: Listener = TcpTransport> {
    listener: L,
    relay: Arc<Relay>,
}

impl Server<TcpTransport> {
    /// Create and bind a new server.
    ///
    /// # Errors
    ///
    /// `ServerError::Config` for invalid settings, `ServerError::Transport`
    /// if the socket cannot be bound.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        config.relay.validate()?;
        let listener = TcpTransport::bind(&config.bind_address).await?;
        Self::with_listener(listener, config.relay)
    }
}

impl<L: Listener> Server<L> {
    /// Create a server on an already bound listener.
    ///
    /// # Errors
    ///
    /// `ServerError::Config` for invalid settings.
    pub fn with_listener(listener: L, config: RelayConfig) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self { listener, relay: Arc::new(Relay::new(config)) })
    }

    /// Shared relay core, for observing the session.
    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    /// Local address the server is bound to.
    ///
    /// # Errors
    ///
    /// `ServerError::Transport` if the listener cannot report it.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    ///
    /// Each connection runs on its own task. Aborted or reset handshakes at
    /// the socket level are skipped.
    ///
    /// # Errors
    ///
    /// `ServerError::Transport` once the listener faults; the session can no
    /// longer admit anyone.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Relay listening on {}", self.local_addr()?);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "connection accepted");
                    let relay = Arc::clone(&self.relay);
                    tokio::spawn(async move {
                        if let Err(e) = relay.serve(stream, peer.to_string()).await {
                            tracing::warn!(%peer, error = %e, "connection dropped");
                        }
                    });
                },
                Err(e) if is_transient(&e) => {
                    tracing::debug!(error = %e, "accept interrupted");
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                    return Err(ServerError::Transport(format!("listener failed: {e}")));
                },
            }
        }
    }
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_during_accept_is_transient() {
        assert!(is_transient(&io::ErrorKind::ConnectionReset.into()));
        assert!(is_transient(&io::ErrorKind::ConnectionAborted.into()));
        assert!(!is_transient(&io::ErrorKind::PermissionDenied.into()));
    }

    #[tokio::test]
    async fn bind_rejects_bad_address() {
        let config = ServerRuntimeConfig { bind_address: "nowhere".into(), ..Default::default() };
        let err = Server::bind(config).await.err().unwrap();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[tokio::test]
    async fn bind_reports_local_addr() {
        let config = ServerRuntimeConfig { bind_address: "127.0.0.1:0".into(), ..Default::default() };
        let server = Server::bind(config).await.unwrap();
        assert!(server.local_addr().unwrap().ip().is_loopback());
    }
}
