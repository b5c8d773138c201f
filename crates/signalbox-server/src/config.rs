//! Relay and runtime configuration.

use std::time::Duration;

use crate::error::ServerError;

/// Port the legacy multiplayer clients connect to by default.
pub const DEFAULT_PORT: u16 = 30000;

/// Tunables for the relay core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// How long participants may claim the dispatcher role after the
    /// dispatcher is lost, before one is appointed
    pub grace_period: Duration,
    /// Upper bound on a single write to one participant
    pub write_timeout: Duration,
    /// Bytes requested from the socket per read
    pub read_chunk: usize,
    /// Chunks buffered between a connection's reader and its relay loop
    pub pipe_depth: usize,
    /// Largest number of unrelayed bytes held while a handshake or `QUIT`
    /// frame is still incomplete
    pub hold_limit: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
            read_chunk: 1024,
            pipe_depth: 64,
            hold_limit: 64 * 1024,
        }
    }
}

impl RelayConfig {
    /// Reject settings the relay cannot run with.
    ///
    /// # Errors
    ///
    /// `ServerError::Config` naming the first zero-valued setting.
    pub fn validate(&self) -> Result<(), ServerError> {
        let zero = [
            ("write_timeout", self.write_timeout.is_zero()),
            ("read_chunk", self.read_chunk == 0),
            ("pipe_depth", self.pipe_depth == 0),
            ("hold_limit", self.hold_limit == 0),
        ];
        match zero.iter().find(|(_, is_zero)| *is_zero) {
            Some((name, _)) => Err(ServerError::Config(format!("{name} must be greater than zero"))),
            None => Ok(()),
        }
    }
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:30000")
    pub bind_address: String,
    /// Relay tunables
    pub relay: RelayConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: format!("0.0.0.0:{DEFAULT_PORT}"), relay: RelayConfig::default() }
    }
}
