//! Deterministic simulation harness for the signalbox relay.
//!
//! Runs the real [`signalbox_server::Server`] on a turmoil host, talking to
//! scripted protocol clients over simulated TCP. Time is simulated as well, so
//! the five-second election grace period costs nothing and every run is
//! reproducible.
//!
//! # Components
//!
//! - [`SimListener`]: turmoil listener plugged into the relay's acceptor
//! - [`SimClient`]: frame-level client for scripting participants
//! - [`RelayProbe`]: read access to the running relay's session state
//! - [`serve_relay`]: host body that binds and runs the relay

pub mod probe;
pub mod sim_client;
pub mod sim_transport;

pub use probe::{RELAY_ADDR, RelayProbe, serve_relay};
pub use sim_client::SimClient;
pub use sim_transport::SimListener;
