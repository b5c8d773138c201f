//! Scripted protocol client.
//!
//! Speaks the wire protocol frame by frame so tests read like the session
//! they describe: send a handshake, expect the dispatcher notice, and so on.

use std::{io, time::Duration};

use signalbox_proto::{Control, Frame, FrameBuffer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use turmoil::net::TcpStream;

/// One simulated participant.
pub struct SimClient {
    stream: TcpStream,
    frames: FrameBuffer,
}

impl SimClient {
    /// Connect to the relay at `address` (e.g. "relay:30000").
    pub async fn connect(address: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        Ok(Self { stream, frames: FrameBuffer::new() })
    }

    /// Address the relay sees for this client, which is also the client's
    /// name until it sends a handshake.
    pub fn endpoint(&self) -> io::Result<String> {
        self.stream.local_addr().map(|addr| addr.to_string())
    }

    /// Send `payload` as one unpadded frame.
    pub async fn send(&mut self, payload: &str) -> io::Result<()> {
        let wire = Frame::new(payload)
            .to_bytes()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.send_raw(&wire).await
    }

    /// Send bytes exactly as given.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await
    }

    /// Wait for the next whole frame.
    ///
    /// # Errors
    ///
    /// `UnexpectedEof` if the relay closes the connection first,
    /// `InvalidData` if the relay sends something that is not a frame.
    pub async fn recv(&mut self) -> io::Result<Frame> {
        loop {
            let next = self.frames.next_frame();
            if let Some(frame) = next.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))? {
                return Ok(frame);
            }

            let mut buf = [0u8; 1024];
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            self.frames.extend(&buf[..n]);
        }
    }

    /// Wait for the next frame and read it as a reserved message; `None`
    /// for ordinary traffic.
    pub async fn recv_control(&mut self) -> io::Result<Option<Control>> {
        let frame = self.recv().await?;
        Ok(Control::parse(frame.payload()))
    }

    /// Wait up to `limit` for the next frame.
    pub async fn recv_within(&mut self, limit: Duration) -> io::Result<Option<Frame>> {
        match tokio::time::timeout(limit, self.recv()).await {
            Ok(frame) => frame.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Fail if a frame arrives within `limit`.
    pub async fn expect_silence(&mut self, limit: Duration) -> io::Result<()> {
        match self.recv_within(limit).await? {
            None => Ok(()),
            Some(frame) => {
                Err(io::Error::other(format!("unexpected frame: {:?}", frame.payload())))
            },
        }
    }

    /// Fail unless the relay closes the connection within `limit`, without
    /// sending anything first.
    pub async fn expect_closed(&mut self, limit: Duration) -> io::Result<()> {
        match self.recv_within(limit).await {
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => Ok(()),
            Err(e) => Err(e),
            Ok(None) => Err(io::Error::new(io::ErrorKind::TimedOut, "connection still open")),
            Ok(Some(frame)) => {
                Err(io::Error::other(format!("unexpected frame: {:?}", frame.payload())))
            },
        }
    }
}
