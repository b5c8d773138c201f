//! Signalbox wire protocol.
//!
//! The relay speaks the legacy multiplayer text protocol: every frame is
//! UTF-16LE text of the form `<length>: <payload>`, where `<length>` is the
//! decimal number of UTF-16 code units in `<payload>`. Relay announcements
//! carry one extra leading blank (` 21: SERVER WhoCanBeServer`).
//!
//! # Components
//!
//! - [`Frame`]: one length-prefixed unit of traffic, with encode/decode
//! - [`FrameBuffer`]: incremental decoder for a growing byte stream
//! - [`whole_frames`]: how much of a live buffer can be forwarded without
//!   splitting a frame
//! - [`find_token`]: locates a reserved sub-message inside a live buffer
//!   without consuming anything it cannot fully interpret
//! - [`Control`]: the reserved keyword vocabulary (`SERVER`, `PLAYER`, `QUIT`,
//!   `LOST`)
//!
//! # Invariants
//!
//! - Decoding never yields a partial payload. A frame whose declared length is
//!   not yet buffered fails with [`ProtocolError::Incomplete`] and consumes no
//!   bytes.
//! - Searches only ever match on code-unit boundaries, so a token can never be
//!   found straddling two UTF-16 characters.

mod control;
mod errors;
mod frame;
mod scan;
pub mod text;

pub use control::{CLAIM_TOKEN, Control, NAME_SEPARATOR, PLAYER_TOKEN, QUIT_TOKEN};
pub use errors::{ProtocolError, Result};
pub use frame::{Frame, FrameBuffer, MAX_LENGTH_DIGITS, MAX_PAYLOAD_UNITS, whole_frames};
pub use scan::{Scan, TokenMatch, contains_token, find_token};
