//! Server error types.

use std::{io, time::Duration};

use signalbox_proto::ProtocolError;
use thiserror::Error;

use crate::registry::RegistryError;

/// Errors that can occur in the server.
///
/// Fatal when returned from [`Server::run`](crate::Server::run); everywhere
/// else scoped to the one connection that produced it.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, zero-sized limits).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (bind failure, listener fault).
    #[error("transport error: {0}")]
    Transport(String),

    /// Frame encoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A handshake named a participant that is already connected.
    #[error("name already taken: {0}")]
    NameTaken(String),

    /// The registry was asked about a connection it does not hold.
    #[error("registry error: {0}")]
    Registry(RegistryError),

    /// An unidentified connection sent more than `limit` bytes without a
    /// complete handshake.
    #[error("no handshake within {limit} bytes")]
    HandshakeOverflow {
        /// Configured hold limit
        limit: usize,
    },
}

impl From<io::Error> for ServerError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<RegistryError> for ServerError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DuplicateName(name) => Self::NameTaken(name),
            other => Self::Registry(other),
        }
    }
}

/// Failure to deliver bytes to one participant.
///
/// Never propagated past the relay: the participant is evicted instead.
#[derive(Error, Debug)]
pub enum SendError {
    /// The write did not finish in time.
    #[error("write to {name} timed out after {after:?}")]
    Timeout {
        /// Recipient
        name: String,
        /// Configured write timeout
        after: Duration,
    },

    /// The socket rejected the write.
    #[error("write to {name} failed: {source}")]
    Io {
        /// Recipient
        name: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}
