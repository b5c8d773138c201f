//! Reserved sub-message search over a live receive buffer.
//!
//! The relay never decodes client traffic frame by frame. It searches the
//! raw buffer for a reserved token such as `": PLAYER "` and then recovers the
//! surrounding frame from the token's position:
//!
//! ```text
//!   ...earlier frames... 18: PLAYER Bob 1.0 abc ...later bytes...
//!   ^ preceding         ^^ length, found by scanning backwards
//!                         ^^^^^^^^^^ token
//!                                   ^^^ name, up to the separator
//! ```
//!
//! The length field has no fixed width, so it is recovered by trying the last
//! four code units before the token, then three, two and one, until one of
//! them parses as a decimal number. Leading blanks inside the tried field are
//! tolerated and become part of the frame.

use std::ops::Range;

use crate::{
    frame::MAX_LENGTH_DIGITS,
    text::{self, CODE_UNIT_SIZE},
};

/// Bytes of the `": "` delimiter every token starts with.
const DELIMITER_BYTES: usize = 2 * CODE_UNIT_SIZE;

/// Outcome of a token search. Nothing is ever consumed; the caller decides
/// what to do with the ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// No usable occurrence of the token in the buffer.
    NotFound,

    /// The token and its length field were found but the frame is not fully
    /// buffered yet.
    Pending {
        /// Bytes before the frame; these belong to earlier traffic
        preceding: usize,
    },

    /// A whole frame carrying the token is buffered.
    Found(TokenMatch),
}

/// A fully buffered frame carrying a reserved token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch {
    /// Value of the frame's length field, in code units
    pub length: usize,
    /// Byte range of the whole frame, length field included
    pub frame: Range<usize>,
    /// Field following the token
    pub name: String,
}

impl TokenMatch {
    /// Bytes before the frame; these belong to earlier traffic.
    pub fn preceding(&self) -> usize {
        self.frame.start
    }

    /// Bytes after the frame.
    pub fn remainder<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        &buffer[self.frame.end..]
    }
}

/// Search `buffer` for `token` and the frame around it.
///
/// `token` must start with `": "` (the frame delimiter), e.g. `": QUIT "`.
/// The name following it ends at the first `separator` inside the frame, or
/// at the end of the frame when there is none. Occurrences of the token with
/// no parsable length in front of them are skipped.
pub fn find_token(buffer: &[u8], token: &str, separator: &str) -> Scan {
    let token = text::encode(token);
    let separator = text::encode(separator);

    let mut from = 0;
    while let Some(at) = text::find(buffer, &token, from) {
        from = at + CODE_UNIT_SIZE;

        let Some((digits, length)) = length_before(&buffer[..at]) else {
            continue;
        };
        let preceding = at - digits * CODE_UNIT_SIZE;
        let frame_end = at + DELIMITER_BYTES + length * CODE_UNIT_SIZE;
        let name_start = at + token.len();
        if frame_end < name_start {
            continue;
        }

        if frame_end > buffer.len() {
            return Scan::Pending { preceding };
        }

        let name_end =
            text::find(&buffer[..frame_end], &separator, name_start).unwrap_or(frame_end);
        return Scan::Found(TokenMatch {
            length,
            frame: preceding..frame_end,
            name: text::decode_lossy(&buffer[name_start..name_end]),
        });
    }

    Scan::NotFound
}

/// Whether `buffer` contains `token` on a code-unit boundary.
pub fn contains_token(buffer: &[u8], token: &str) -> bool {
    text::find(buffer, &text::encode(token), 0).is_some()
}

/// Recover the length field ending at the end of `preface`.
///
/// Returns the number of code units the field spans and its value.
fn length_before(preface: &[u8]) -> Option<(usize, usize)> {
    let available = preface.len() / CODE_UNIT_SIZE;
    (1..=MAX_LENGTH_DIGITS.min(available)).rev().find_map(|digits| {
        let field = text::decode_lossy(&preface[preface.len() - digits * CODE_UNIT_SIZE..]);
        let trimmed = field.trim_start();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        trimmed.parse().ok().map(|length| (digits, length))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Frame, PLAYER_TOKEN, QUIT_TOKEN};

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut out = Vec::new();
        for frame in frames {
            frame.encode(&mut out).unwrap();
        }
        out
    }

    #[test]
    fn finds_handshake_at_buffer_start() {
        let handshake = Frame::new("PLAYER Bob 1.0 abc");
        let buffer = wire(&[handshake.clone()]);

        let Scan::Found(found) = find_token(&buffer, PLAYER_TOKEN, " ") else {
            panic!("handshake not found");
        };
        assert_eq!(found.name, "Bob");
        assert_eq!(found.length, handshake.len());
        assert_eq!(found.frame, 0..buffer.len());
        assert!(found.remainder(&buffer).is_empty());
    }

    #[test]
    fn reports_earlier_traffic_as_preceding() {
        let chat = wire(&[Frame::new("hi!!!")]);
        let buffer = wire(&[Frame::new("hi!!!"), Frame::new("PLAYER Bob 1.0"), Frame::new("x")]);

        let Scan::Found(found) = find_token(&buffer, PLAYER_TOKEN, " ") else {
            panic!("handshake not found");
        };
        assert_eq!(found.preceding(), chat.len());
        assert_eq!(found.remainder(&buffer), &wire(&[Frame::new("x")])[..]);
    }

    #[test]
    fn padded_frame_blank_belongs_to_frame() {
        let buffer = wire(&[Frame::new("ok"), Frame::padded("PLAYER Ann 2")]);

        let Scan::Found(found) = find_token(&buffer, PLAYER_TOKEN, " ") else {
            panic!("handshake not found");
        };
        assert_eq!(found.preceding(), wire(&[Frame::new("ok")]).len());
        assert_eq!(found.name, "Ann");
    }

    #[test]
    fn partial_frame_is_pending() {
        let earlier = wire(&[Frame::new("hello")]);
        let buffer = wire(&[Frame::new("hello"), Frame::new("PLAYER Bob 1.0 abc")]);

        assert_eq!(
            find_token(&buffer[..buffer.len() - 2], PLAYER_TOKEN, " "),
            Scan::Pending { preceding: earlier.len() }
        );
    }

    #[test]
    fn name_runs_to_frame_end_without_separator() {
        let buffer = wire(&[Frame::new("QUIT Bob"), Frame::new("tail")]);

        let Scan::Found(found) = find_token(&buffer, QUIT_TOKEN, " ") else {
            panic!("quit not found");
        };
        assert_eq!(found.name, "Bob");
        assert_eq!(found.remainder(&buffer), &wire(&[Frame::new("tail")])[..]);
    }

    #[test]
    fn missing_token_is_not_found() {
        let buffer = wire(&[Frame::new("hello"), Frame::new("world")]);
        assert_eq!(find_token(&buffer, PLAYER_TOKEN, " "), Scan::NotFound);
        assert_eq!(find_token(&[], PLAYER_TOKEN, " "), Scan::NotFound);
    }

    #[test]
    fn occurrence_without_length_is_skipped() {
        let mut buffer = text::encode("xx: PLAYER fake ");
        buffer.extend(wire(&[Frame::new("PLAYER Real 1")]));

        let Scan::Found(found) = find_token(&buffer, PLAYER_TOKEN, " ") else {
            panic!("handshake not found");
        };
        assert_eq!(found.name, "Real");
    }

    #[test]
    fn digit_suffix_is_absorbed_into_length() {
        // Payload "ab12" followed by a 10-unit handshake reads back as a
        // length of 1210; the frame then looks unfinished.
        let buffer = wire(&[Frame::new("ab12"), Frame::new("PLAYER Z 1")]);
        assert!(matches!(find_token(&buffer, PLAYER_TOKEN, " "), Scan::Pending { .. }));
    }

    #[test]
    fn contains_checks_alignment() {
        let buffer = wire(&[Frame::new("SERVER MakeMeServer")]);
        assert!(contains_token(&buffer, ": SERVER MakeMeServer"));
        assert!(!contains_token(&buffer[1..], ": SERVER MakeMeServer"));
    }
}
