//! Shared relay core.
//!
//! One [`Relay`] serves every connection. Its registry lock is the single
//! point where membership, names and the dispatcher pointer change; socket
//! writes always happen after the lock is released so a slow participant never
//! holds up the registry.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;
use signalbox_proto::{Control, text};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::Mutex,
};
use tracing::Instrument;

use crate::{
    config::RelayConfig,
    error::{SendError, ServerError},
    failover, pipeline,
    registry::{Admission, ParticipantRegistry},
    sender::{self, Outbound},
};

/// Relay state shared by all connection pipelines.
pub struct Relay {
    pub(crate) registry: Mutex<ParticipantRegistry<Outbound>>,
    pub(crate) config: RelayConfig,
    next_id: AtomicU64,
}

impl Relay {
    /// Create a relay with an empty session.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            registry: Mutex::new(ParticipantRegistry::new()),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    /// Relay tunables.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Run one connection until it ends, then tear it down.
    ///
    /// `endpoint` is the peer's address text; it names the participant until
    /// its handshake arrives.
    ///
    /// # Errors
    ///
    /// The reason the connection was dropped early: a taken name, an endpoint
    /// already registered, or a handshake that never completed. Ordinary
    /// disconnects and self-quits return `Ok`.
    pub async fn serve<S>(self: Arc<Self>, stream: S, endpoint: String) -> Result<(), ServerError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let span = tracing::debug_span!("connection", peer = %endpoint);
        pipeline::run(self, stream, endpoint).instrument(span).await
    }

    /// Names of all registered participants, sorted.
    pub async fn participants(&self) -> Vec<String> {
        self.registry.lock().await.names()
    }

    /// Current dispatcher, if one is assigned.
    pub async fn dispatcher(&self) -> Option<String> {
        self.registry.lock().await.dispatcher().map(str::to_string)
    }

    /// Whether a dispatcher election is waiting on its grace period.
    pub async fn election_open(&self) -> bool {
        self.registry.lock().await.election().is_some()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a new connection under its endpoint name. The first
    /// participant of a session is told it is the dispatcher.
    pub(crate) async fn admit(&self, endpoint: &str, handle: &Outbound) -> Result<(), ServerError> {
        let admission = self.registry.lock().await.admit(endpoint, handle.clone())?;
        tracing::debug!(participant = endpoint, ?admission, "admitted");

        if admission == Admission::Dispatcher {
            tracing::info!(participant = endpoint, "dispatcher assigned to first participant");
            self.unicast_control(endpoint, handle, Control::You).await;
        }
        Ok(())
    }

    /// Rename a connection after its handshake and forward the raw handshake
    /// frame to the dispatcher. During an election the frame is held for
    /// whoever wins it.
    pub(crate) async fn identify(
        &self,
        placeholder: &str,
        name: &str,
        handshake: &Bytes,
    ) -> Result<(), ServerError> {
        let route = {
            let mut registry = self.registry.lock().await;
            registry.rename(placeholder, name)?;
            match registry.dispatcher().map(str::to_string) {
                Some(dispatcher) => {
                    let handle = registry.handle(&dispatcher).cloned();
                    Route::Dispatcher(dispatcher, handle)
                },
                None if registry.hold_handshake(name, handshake.clone()) => Route::Held,
                None => Route::Nowhere,
            }
        };
        tracing::info!(participant = name, from = placeholder, "participant identified");

        match route {
            Route::Dispatcher(dispatcher, _) if dispatcher == name => {},
            Route::Dispatcher(dispatcher, Some(handle)) => {
                self.unicast_to(&dispatcher, &handle, handshake).await;
            },
            Route::Held => {
                tracing::debug!(participant = name, "handshake held until election settles");
            },
            Route::Dispatcher(_, None) | Route::Nowhere => {
                tracing::warn!(participant = name, "no dispatcher to receive handshake");
            },
        }
        Ok(())
    }

    /// Relay bytes from `from` to every other participant.
    pub(crate) async fn broadcast_from(&self, from: &str, bytes: &[u8]) {
        tracing::trace!(from, payload = %text::decode_lossy(bytes), "relay");
        let recipients = self.registry.lock().await.recipients(Some(from));
        self.deliver(recipients, bytes).await;
    }

    /// Write bytes to one participant, evicting it on failure.
    pub(crate) async fn unicast_to(&self, name: &str, handle: &Outbound, bytes: &[u8]) {
        tracing::trace!(to = name, payload = %text::decode_lossy(bytes), "unicast");
        if let Err(e) = sender::unicast(name, handle, bytes, self.config.write_timeout).await {
            evict(handle, &e);
        }
    }

    /// Announce a control message to every participant.
    pub(crate) async fn announce(&self, control: Control) {
        let Some(bytes) = encode(control) else {
            return;
        };
        let recipients = self.registry.lock().await.recipients(None);
        self.deliver(recipients, &bytes).await;
    }

    /// Offer `name` as dispatcher. Only takes effect while an election is
    /// open.
    pub(crate) async fn claim(&self, name: &str) {
        failover::accept_claim(self, name).await;
    }

    /// Remove connection `id` registered as `name`, tell everyone, and start
    /// an election if it was the dispatcher.
    ///
    /// Does nothing if `name` now belongs to another connection or was
    /// already removed.
    pub(crate) async fn teardown(self: &Arc<Self>, name: &str, id: u64) {
        let removal = {
            let mut registry = self.registry.lock().await;
            if registry.handle(name).map(Outbound::id) != Some(id) {
                return;
            }
            registry.remove(name)
        };
        let Some(removal) = removal else {
            return;
        };

        removal.handle.shutdown().await;
        tracing::info!(participant = name, "participant lost");
        self.announce(Control::Lost(name.to_string())).await;

        if let Some(epoch) = removal.election {
            failover::open_election(self, name, epoch).await;
        }
    }

    async fn unicast_control(&self, name: &str, handle: &Outbound, control: Control) {
        if let Some(bytes) = encode(control) {
            self.unicast_to(name, handle, &bytes).await;
        }
    }

    async fn deliver(&self, recipients: Vec<(String, Outbound)>, bytes: &[u8]) {
        if recipients.is_empty() {
            return;
        }
        for (handle, e) in sender::broadcast(recipients, bytes, self.config.write_timeout).await {
            evict(&handle, &e);
        }
    }
}

/// Where a handshake frame goes.
enum Route {
    Dispatcher(String, Option<Outbound>),
    Held,
    Nowhere,
}

fn evict(handle: &Outbound, error: &SendError) {
    tracing::warn!(connection = handle.id(), %error, "delivery failed, evicting");
    handle.evict();
}

fn encode(control: Control) -> Option<Bytes> {
    match control.into_frame().to_bytes() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(error = %e, "announcement does not fit in a frame");
            None
        },
    }
}
