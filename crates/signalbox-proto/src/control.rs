//! Reserved keywords the relay recognises or emits.
//!
//! Everything else a client sends is opaque to the relay and passed through
//! unchanged.

use std::fmt;

use crate::Frame;

/// Token marking a client handshake frame.
pub const PLAYER_TOKEN: &str = ": PLAYER ";

/// Token marking a client's graceful-leave frame.
pub const QUIT_TOKEN: &str = ": QUIT ";

/// Token marking a client's bid for the dispatcher role.
pub const CLAIM_TOKEN: &str = ": SERVER MakeMeServer";

/// Separator ending the name field after a token.
pub const NAME_SEPARATOR: &str = " ";

const YOU: &str = "YOU";
const CHALLENGE: &str = "WhoCanBeServer";
const CLAIM: &str = "MakeMeServer";

/// A reserved protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// `SERVER YOU`: the recipient is now the dispatcher.
    You,
    /// `SERVER WhoCanBeServer`: the dispatcher was lost, volunteers wanted.
    WhoCanBeServer,
    /// `SERVER MakeMeServer`: a client volunteers as dispatcher.
    MakeMeServer,
    /// `SERVER <name>`: `<name>` is now the dispatcher.
    Appoint(String),
    /// `PLAYER <name> <rest>`: client handshake.
    Player {
        /// Display name the client wants
        name: String,
        /// Opaque handshake details
        rest: String,
    },
    /// `QUIT <name>`: a client is leaving.
    Quit(String),
    /// `LOST <name>`: the relay removed a participant.
    Lost(String),
}

impl Control {
    /// Parse a frame payload. Returns `None` for ordinary traffic.
    pub fn parse(payload: &str) -> Option<Self> {
        let (keyword, argument) = payload.split_once(' ')?;
        match keyword {
            "SERVER" => Some(match argument {
                YOU => Self::You,
                CHALLENGE => Self::WhoCanBeServer,
                CLAIM => Self::MakeMeServer,
                name => Self::Appoint(name.to_string()),
            }),
            "PLAYER" => {
                let (name, rest) = argument.split_once(' ').unwrap_or((argument, ""));
                Some(Self::Player { name: name.to_string(), rest: rest.to_string() })
            },
            "QUIT" => Some(Self::Quit(first_field(argument))),
            "LOST" => Some(Self::Lost(argument.to_string())),
            _ => None,
        }
    }

    /// Wrap the message in a frame, padded the way the legacy relay pads it.
    pub fn into_frame(self) -> Frame {
        let payload = self.to_string();
        match self {
            Self::You | Self::Player { .. } | Self::Quit(_) | Self::MakeMeServer => {
                Frame::new(payload)
            },
            Self::WhoCanBeServer | Self::Appoint(_) | Self::Lost(_) => Frame::padded(payload),
        }
    }
}

fn first_field(argument: &str) -> String {
    argument.split(' ').next().unwrap_or_default().to_string()
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::You => write!(f, "SERVER {YOU}"),
            Self::WhoCanBeServer => write!(f, "SERVER {CHALLENGE}"),
            Self::MakeMeServer => write!(f, "SERVER {CLAIM}"),
            Self::Appoint(name) => write!(f, "SERVER {name}"),
            Self::Player { name, rest } if rest.is_empty() => write!(f, "PLAYER {name} "),
            Self::Player { name, rest } => write!(f, "PLAYER {name} {rest}"),
            Self::Quit(name) => write!(f, "QUIT {name}"),
            Self::Lost(name) => write!(f, "LOST {name}"),
        }
    }
}
