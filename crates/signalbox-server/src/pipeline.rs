//! Per-connection pipeline.
//!
//! Each connection runs two tasks:
//!
//! - **Fill**: reads the socket in `read_chunk` pieces and pushes them into a
//!   bounded channel. Ends on EOF or a read error by dropping the sender.
//! - **Relay** (this task): accumulates chunks and decides what to do with
//!   them. Until the handshake arrives it searches for `PLAYER`; afterwards it
//!   relays everything verbatim, watching only for its own `QUIT` and for a
//!   dispatcher claim.
//!
//! Bytes are forwarded in whole frames where the stream is well formed, so
//! traffic from different sources never interleaves inside a frame at the
//! recipient. Whatever cannot be forwarded yet stays buffered, up to
//! `hold_limit` bytes.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use signalbox_proto::{
    CLAIM_TOKEN, NAME_SEPARATOR, PLAYER_TOKEN, QUIT_TOKEN, Scan, contains_token, find_token,
    text::CODE_UNIT_SIZE, whole_frames,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadHalf},
    sync::mpsc,
};

use crate::{error::ServerError, relay::Relay, sender::Outbound};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Run a connection from admission to teardown.
pub(crate) async fn run<S>(
    relay: Arc<Relay>,
    stream: S,
    endpoint: String,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let handle = Outbound::new(relay.next_id(), writer);

    if let Err(e) = relay.admit(&endpoint, &handle).await {
        handle.shutdown().await;
        return Err(e);
    }

    let (tx, rx) = mpsc::channel(relay.config().pipe_depth);
    let fill = tokio::spawn(fill(reader, tx, relay.config().read_chunk));

    let mut connection = Connection {
        relay,
        handle,
        name: endpoint,
        identified: false,
        pending: BytesMut::new(),
    };
    let result = connection.relay_loop(rx).await;

    fill.abort();
    connection.relay.teardown(&connection.name, connection.handle.id()).await;
    result
}

async fn fill<R>(mut reader: ReadHalf<R>, chunks: mpsc::Sender<Bytes>, read_chunk: usize)
where
    R: AsyncRead,
{
    let mut buf = BytesMut::with_capacity(read_chunk);
    loop {
        buf.reserve(read_chunk);
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                tracing::debug!("peer closed connection");
                break;
            },
            Ok(_) => {
                if chunks.send(buf.split().freeze()).await.is_err() {
                    break;
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "read failed");
                break;
            },
        }
    }
}

struct Connection {
    relay: Arc<Relay>,
    handle: Outbound,
    /// Endpoint text until the handshake, then the player name
    name: String,
    identified: bool,
    pending: BytesMut,
}

impl Connection {
    async fn relay_loop(&mut self, mut chunks: mpsc::Receiver<Bytes>) -> Result<(), ServerError> {
        loop {
            let chunk = tokio::select! {
                biased;
                () = self.handle.evicted() => {
                    tracing::debug!(participant = %self.name, "evicted");
                    return Ok(());
                },
                chunk = chunks.recv() => chunk,
            };
            let Some(chunk) = chunk else {
                return Ok(());
            };

            self.pending.extend_from_slice(&chunk);
            if self.drain().await? == Flow::Quit {
                return Ok(());
            }
        }
    }

    /// Act on everything that can be acted on in the buffer.
    async fn drain(&mut self) -> Result<Flow, ServerError> {
        if !self.identified && !self.await_handshake().await? {
            return Ok(Flow::Continue);
        }

        match find_token(&self.pending, QUIT_TOKEN, NAME_SEPARATOR) {
            Scan::Found(quit) if quit.name == self.name => {
                tracing::debug!(participant = %self.name, "participant quit");
                self.pending.clear();
                return Ok(Flow::Quit);
            },
            Scan::Pending { preceding } => {
                // Hold the unfinished QUIT frame; it may be ours
                let ready = whole_frames(&self.pending[..preceding]);
                self.forward(ready).await;
            },
            Scan::Found(_) | Scan::NotFound => {
                let ready = whole_frames(&self.pending);
                self.forward(ready).await;
            },
        }

        if self.pending.len() > self.relay.config().hold_limit {
            let held = self.pending.len();
            tracing::debug!(participant = %self.name, held, "flushing held bytes");
            let whole_units = self.pending.len() - self.pending.len() % CODE_UNIT_SIZE;
            self.forward(whole_units).await;
        }
        Ok(Flow::Continue)
    }

    /// Look for the handshake. Returns `true` once the connection is
    /// identified.
    async fn await_handshake(&mut self) -> Result<bool, ServerError> {
        match find_token(&self.pending, PLAYER_TOKEN, NAME_SEPARATOR) {
            Scan::Found(handshake) => {
                self.forward(handshake.preceding()).await;
                let frame = self.pending.split_to(handshake.frame.len()).freeze();

                self.relay.identify(&self.name, &handshake.name, &frame).await?;
                self.name = handshake.name;
                self.identified = true;
                Ok(true)
            },
            Scan::Pending { preceding } => {
                let ready = whole_frames(&self.pending[..preceding]);
                self.forward(ready).await;
                self.check_hold()?;
                Ok(false)
            },
            Scan::NotFound => {
                self.check_hold()?;
                Ok(false)
            },
        }
    }

    fn check_hold(&self) -> Result<(), ServerError> {
        let limit = self.relay.config().hold_limit;
        if self.pending.len() > limit {
            return Err(ServerError::HandshakeOverflow { limit });
        }
        Ok(())
    }

    /// Broadcast the first `len` buffered bytes.
    async fn forward(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let bytes = self.pending.split_to(len).freeze();
        self.relay.broadcast_from(&self.name, &bytes).await;

        if self.identified && contains_token(&bytes, CLAIM_TOKEN) {
            self.relay.claim(&self.name).await;
        }
    }
}
