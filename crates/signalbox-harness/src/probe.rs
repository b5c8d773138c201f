//! Relay host helper and session observer.

use std::sync::{Arc, OnceLock};

use signalbox_server::{DEFAULT_PORT, Relay, RelayConfig, Server};

use crate::SimListener;

/// Address clients use to reach the relay host started by [`serve_relay`].
pub const RELAY_ADDR: &str = "relay:30000";

/// Read access to the relay running on the simulated host.
///
/// Clones share the same relay. Turmoil runs every host on one thread, so a
/// client may inspect the relay's registry between its own network steps.
#[derive(Clone, Default)]
pub struct RelayProbe {
    relay: Arc<OnceLock<Arc<Relay>>>,
}

impl RelayProbe {
    /// Create a probe with no relay attached yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn attach(&self, relay: Arc<Relay>) {
        if self.relay.set(relay).is_err() {
            tracing::warn!("probe already attached to a relay");
        }
    }

    /// The relay, once its host has started.
    pub fn relay(&self) -> Option<Arc<Relay>> {
        self.relay.get().cloned()
    }

    /// Current dispatcher.
    pub async fn dispatcher(&self) -> Option<String> {
        match self.relay.get() {
            Some(relay) => relay.dispatcher().await,
            None => None,
        }
    }

    /// Registered participant names, sorted.
    pub async fn participants(&self) -> Vec<String> {
        match self.relay.get() {
            Some(relay) => relay.participants().await,
            None => Vec::new(),
        }
    }
}

/// Host body: bind the relay on its default port, attach `probe`, and serve
/// until the simulation ends.
///
/// ```ignore
/// let probe = RelayProbe::new();
/// let host_probe = probe.clone();
/// sim.host("relay", move || serve_relay(RelayConfig::default(), host_probe.clone()));
/// ```
pub async fn serve_relay(config: RelayConfig, probe: RelayProbe) -> turmoil::Result {
    let listener = SimListener::bind(&format!("0.0.0.0:{DEFAULT_PORT}")).await?;
    let server = Server::with_listener(listener, config)?;
    probe.attach(server.relay());

    server.run().await?;
    Ok(())
}
