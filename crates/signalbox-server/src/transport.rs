//! Listening socket abstraction.
//!
//! The acceptor only needs "give me the next connection". Production uses
//! [`TcpTransport`]; the simulation harness plugs in its own listener.

use std::{future::Future, io, net::SocketAddr};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};

use crate::error::ServerError;

/// Source of inbound connections.
pub trait Listener: Send + Sync + 'static {
    /// Connection type produced by [`accept`](Self::accept).
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Wait for the next connection.
    fn accept(&self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;

    /// Address the listener is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// TCP listener on a real socket.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind to `address` (e.g. "0.0.0.0:30000").
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if `address` is not a socket address
    /// - `ServerError::Transport` if the socket cannot be bound
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::debug!("TCP transport bound to {}", addr);
        Ok(Self { listener })
    }
}

impl Listener for TcpTransport {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        // Frames are small and latency-sensitive
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
        }
        Ok((stream, peer))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
