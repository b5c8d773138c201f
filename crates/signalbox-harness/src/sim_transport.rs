//! Turmoil-backed listener for the relay's acceptor.

use std::{io, net::SocketAddr};

use signalbox_server::Listener;
use turmoil::net::{TcpListener, TcpStream};

/// Listener on a simulated host.
pub struct SimListener {
    listener: TcpListener,
}

impl SimListener {
    /// Bind on the current turmoil host.
    pub async fn bind(address: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self { listener })
    }
}

impl Listener for SimListener {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.listener.accept().await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
