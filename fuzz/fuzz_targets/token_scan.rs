//! Fuzz target for reserved token search over raw receive buffers
//!
//! The relay runs `find_token` and `whole_frames` on whatever a client sends,
//! before anything is validated. Neither may panic, and every range they
//! report must lie inside the buffer.
//!
//! # Invariants
//!
//! - `Found` frames end inside the buffer and start at `preceding()`
//! - `Pending` never claims more preceding bytes than the buffer holds
//! - `whole_frames` never exceeds the buffer and stays on a code-unit boundary
//! - Every token the relay watches for is searched with its real separator

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use signalbox_proto::{
    CLAIM_TOKEN, NAME_SEPARATOR, PLAYER_TOKEN, QUIT_TOKEN, Scan, contains_token, find_token,
    text, whole_frames,
};

#[derive(Debug, Arbitrary)]
enum Input {
    /// Raw bytes, possibly odd-length
    Bytes(Vec<u8>),
    /// Text fragments joined and encoded, so tokens show up far more often
    Text(Vec<Fragment>),
}

#[derive(Debug, Arbitrary)]
enum Fragment {
    Player,
    Quit,
    Claim,
    Digits(u16),
    Blank,
    Word(String),
}

fn render(fragments: &[Fragment]) -> Vec<u8> {
    let mut line = String::new();
    for fragment in fragments {
        match fragment {
            Fragment::Player => line.push_str(PLAYER_TOKEN),
            Fragment::Quit => line.push_str(QUIT_TOKEN),
            Fragment::Claim => line.push_str(CLAIM_TOKEN),
            Fragment::Digits(n) => line.push_str(&n.to_string()),
            Fragment::Blank => line.push(' '),
            Fragment::Word(word) => line.push_str(word),
        }
    }
    text::encode(&line)
}

fuzz_target!(|input: Input| {
    let buffer = match input {
        Input::Bytes(bytes) => bytes,
        Input::Text(fragments) => render(&fragments),
    };

    for token in [PLAYER_TOKEN, QUIT_TOKEN] {
        match find_token(&buffer, token, NAME_SEPARATOR) {
            Scan::Found(found) => {
                assert!(found.frame.end <= buffer.len());
                assert!(found.preceding() <= found.frame.end);
                let _ = found.remainder(&buffer);
            },
            Scan::Pending { preceding } => assert!(preceding <= buffer.len()),
            Scan::NotFound => {},
        }
    }

    let _ = contains_token(&buffer, CLAIM_TOKEN);

    let whole = whole_frames(&buffer);
    assert!(whole <= buffer.len());
    assert_eq!(whole % text::CODE_UNIT_SIZE, 0);
});
