//! Dispatcher failover.
//!
//! Losing the dispatcher opens an election: everyone is asked who can take
//! over, and after the grace period the longest-connected participant is
//! appointed unless somebody claimed the role first. This is a fallback for a
//! small group of trusted peers; there is no voting and no quorum.
//!
//! ```text
//!   Stable --dispatcher lost--> Election --claim or grace period--> Stable
//!                                  |
//!                                  +--nobody left--> Empty (next admit reseeds)
//! ```
//!
//! Handshakes that arrive while the role is vacant are held and delivered to
//! the new dispatcher right after its appointment is announced.
//!
//! Each election carries an epoch. A grace timer only acts on its own epoch,
//! so a timer left over from an election that a claim or a reseed already
//! settled is a no-op.

use std::sync::Arc;

use bytes::Bytes;
use signalbox_proto::Control;

use crate::{registry::ParticipantRegistry, relay::Relay, sender::Outbound};

/// Announce the election and start its grace timer.
pub(crate) async fn open_election(relay: &Arc<Relay>, lost: &str, epoch: u64) {
    tracing::info!(dispatcher = lost, epoch, "dispatcher lost, election open");
    relay.announce(Control::WhoCanBeServer).await;

    let relay = Arc::clone(relay);
    let grace = relay.config.grace_period;
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        finish_election(&relay, epoch).await;
    });
}

/// Appoint a dispatcher if election `epoch` is still open.
pub(crate) async fn finish_election(relay: &Relay, epoch: u64) {
    let settled = {
        let mut registry = relay.registry.lock().await;
        registry.appoint(epoch).map(|name| settle(&mut registry, name))
    };
    match settled {
        Some(settled) => {
            tracing::info!(dispatcher = %settled.dispatcher, epoch, "dispatcher appointed");
            announce_settled(relay, settled).await;
        },
        None => tracing::debug!(epoch, "election already settled"),
    }
}

/// Make `name` the dispatcher if an election is open.
pub(crate) async fn accept_claim(relay: &Relay, name: &str) {
    let settled = {
        let mut registry = relay.registry.lock().await;
        registry.claim(name).then(|| settle(&mut registry, name.to_string()))
    };
    match settled {
        Some(settled) => {
            tracing::info!(dispatcher = name, "dispatcher role claimed");
            announce_settled(relay, settled).await;
        },
        None => tracing::debug!(participant = name, "claim ignored, no open election"),
    }
}

/// A settled election: the new dispatcher and the handshakes it missed.
struct Settled {
    dispatcher: String,
    handle: Option<Outbound>,
    handshakes: Vec<(String, Bytes)>,
}

fn settle(registry: &mut ParticipantRegistry<Outbound>, dispatcher: String) -> Settled {
    let handle = registry.handle(&dispatcher).cloned();
    let handshakes = registry.take_handshakes();
    Settled { dispatcher, handle, handshakes }
}

/// Tell everyone who won, then catch the winner up on handshakes that
/// arrived while the role was vacant.
async fn announce_settled(relay: &Relay, settled: Settled) {
    relay.announce(Control::Appoint(settled.dispatcher.clone())).await;

    let Some(handle) = settled.handle else {
        return;
    };
    for (participant, handshake) in settled.handshakes {
        tracing::debug!(%participant, "delivering held handshake");
        relay.unicast_to(&settled.dispatcher, &handle, &handshake).await;
    }
}
