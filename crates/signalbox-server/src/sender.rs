//! Outbound delivery: one participant (unicast) or many (broadcast).
//!
//! Every connection's write half lives behind its own lock inside an
//! [`Outbound`] handle, so writes from different sources to the same
//! recipient never interleave within a chunk. A failed write is reported to
//! the caller and nothing else; the relay evicts the recipient.

use std::{io, sync::Arc, time::Duration};

use futures::future::join_all;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::{Mutex, Notify},
};

use crate::error::SendError;

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared handle to one connection's outbound stream.
///
/// Cloning is cheap; all clones write to the same stream and share the same
/// eviction signal.
#[derive(Clone)]
pub struct Outbound {
    id: u64,
    writer: Arc<Mutex<Writer>>,
    evicted: Arc<Notify>,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbound").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Outbound {
    /// Wrap the write half of connection `id`.
    pub fn new(id: u64, writer: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            id,
            writer: Arc::new(Mutex::new(Box::new(writer))),
            evicted: Arc::new(Notify::new()),
        }
    }

    /// Connection id, unique for the life of the relay.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Ask the owning connection to shut down.
    ///
    /// The signal is remembered if the connection is not currently waiting
    /// for it.
    pub fn evict(&self) {
        self.evicted.notify_one();
    }

    /// Resolves once [`evict`](Self::evict) has been called.
    pub async fn evicted(&self) {
        self.evicted.notified().await;
    }

    /// Close the outbound stream. Errors are irrelevant at this point and
    /// ignored.
    pub async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }

    async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }
}

/// Write `bytes` to one participant within `timeout`.
///
/// # Errors
///
/// - `SendError::Timeout` if the write (including waiting for the stream)
///   took longer than `timeout`
/// - `SendError::Io` if the stream rejected it
pub async fn unicast(
    name: &str,
    handle: &Outbound,
    bytes: &[u8],
    timeout: Duration,
) -> Result<(), SendError> {
    match tokio::time::timeout(timeout, handle.write(bytes)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(SendError::Io { name: name.to_string(), source }),
        Err(_) => Err(SendError::Timeout { name: name.to_string(), after: timeout }),
    }
}

/// Write `bytes` to every recipient concurrently and wait for all of them.
///
/// Returns the handle and error of each recipient that could not be reached.
/// One failure never stops delivery to the others.
pub async fn broadcast(
    recipients: Vec<(String, Outbound)>,
    bytes: &[u8],
    timeout: Duration,
) -> Vec<(Outbound, SendError)> {
    let deliveries = recipients.into_iter().map(|(name, handle)| async move {
        match unicast(&name, &handle, bytes, timeout).await {
            Ok(()) => None,
            Err(e) => Some((handle, e)),
        }
    });

    join_all(deliveries).await.into_iter().flatten().collect()
}
