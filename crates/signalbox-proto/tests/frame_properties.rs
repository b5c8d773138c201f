//! Property-based tests for frame encoding, stream decoding and token search.
//!
//! These tests verify that the codec is correct for ALL valid payloads, not
//! just specific examples, and that no split of the byte stream can make the
//! decoder or the scanner consume bytes too early.

use proptest::prelude::*;
use signalbox_proto::{
    Frame, FrameBuffer, MAX_PAYLOAD_UNITS, NAME_SEPARATOR, PLAYER_TOKEN, QUIT_TOKEN, Scan,
    find_token, text,
};

/// Strategy for payload text, including characters outside the BMP
fn arbitrary_payload() -> impl Strategy<Value = String> {
    "\\PC{0,300}"
}

/// Strategy for display names (no blanks, never empty)
fn arbitrary_name() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{1,16}"
}

/// Strategy for frames with either separator form
fn arbitrary_frame() -> impl Strategy<Value = Frame> {
    (arbitrary_payload(), any::<bool>())
        .prop_map(|(payload, padded)| if padded { Frame::padded(payload) } else { Frame::new(payload) })
}

fn encode_all(frames: &[Frame]) -> Vec<u8> {
    let mut wire = Vec::new();
    for frame in frames {
        frame.encode(&mut wire).expect("encode should succeed");
    }
    wire
}

#[test]
fn prop_frame_encode_decode_roundtrip() {
    proptest!(|(frame in arbitrary_frame())| {
        let wire = frame.to_bytes().expect("encode should succeed");
        let (decoded, consumed) = Frame::decode(&wire).expect("decode should succeed");

        // PROPERTY: Round-trip must be identity
        prop_assert_eq!(&decoded, &frame);
        prop_assert_eq!(consumed, wire.len(), "Decoder must consume exactly one frame");
        prop_assert_eq!(decoded.len(), text::code_units(frame.payload()));
    });
}

#[test]
fn prop_every_strict_prefix_is_incomplete() {
    proptest!(|(frame in arbitrary_frame())| {
        let wire = frame.to_bytes().expect("encode should succeed");

        // PROPERTY: No prefix ever yields a payload
        for cut in 0..wire.len() {
            let err = Frame::decode(&wire[..cut]).expect_err("prefix must not decode");
            prop_assert!(err.is_incomplete(), "cut at {} gave {:?}", cut, err);
        }
    });
}

#[test]
fn prop_stream_split_at_any_boundary() {
    proptest!(|(
        frames in prop::collection::vec(arbitrary_frame(), 1..6),
        split in any::<prop::sample::Index>(),
    )| {
        let wire = encode_all(&frames);
        let cut = split.index(wire.len() + 1);

        let mut buffer = FrameBuffer::new();
        let mut decoded = Vec::new();
        for chunk in [&wire[..cut], &wire[cut..]] {
            buffer.extend(chunk);
            while let Some(frame) = buffer.next_frame().expect("stream should stay in sync") {
                decoded.push(frame);
            }
        }

        // PROPERTY: Splitting the stream never corrupts or loses frames
        prop_assert_eq!(decoded, frames);
        prop_assert!(buffer.is_empty());
    });
}

#[test]
fn prop_stream_byte_by_byte() {
    proptest!(|(frames in prop::collection::vec(arbitrary_frame(), 1..4))| {
        let wire = encode_all(&frames);

        let mut buffer = FrameBuffer::new();
        let mut decoded = Vec::new();
        for byte in &wire {
            buffer.extend(std::slice::from_ref(byte));
            while let Some(frame) = buffer.next_frame().expect("stream should stay in sync") {
                decoded.push(frame);
            }
        }

        prop_assert_eq!(decoded, frames);
    });
}

#[test]
fn prop_handshake_found_only_when_complete() {
    proptest!(|(
        chatter in prop::collection::vec("[a-z!]{1,20}", 0..4),
        name in arbitrary_name(),
        rest in "[a-z0-9 .]{0,30}",
    )| {
        let mut frames: Vec<Frame> = chatter.into_iter().map(Frame::new).collect();
        let preceding = encode_all(&frames).len();
        frames.push(Frame::new(format!("PLAYER {name} {rest}")));
        let wire = encode_all(&frames);

        // PROPERTY: Every strict prefix is either unknown or pending
        for cut in 0..wire.len() {
            let scan = find_token(&wire[..cut], PLAYER_TOKEN, NAME_SEPARATOR);
            prop_assert!(!matches!(scan, Scan::Found(_)), "premature match at {}", cut);
        }

        // PROPERTY: The whole buffer yields the frame and the earlier traffic
        let Scan::Found(found) = find_token(&wire, PLAYER_TOKEN, NAME_SEPARATOR) else {
            return Err(TestCaseError::fail("handshake not found"));
        };
        prop_assert_eq!(found.name.clone(), name);
        prop_assert_eq!(found.preceding(), preceding);
        prop_assert_eq!(found.frame.end, wire.len());
    });
}

#[test]
fn prop_quit_name_recovered() {
    proptest!(|(name in arbitrary_name(), trailing in any::<bool>())| {
        let payload = if trailing { format!("QUIT {name} ") } else { format!("QUIT {name}") };
        let wire = Frame::new(payload).to_bytes().expect("encode should succeed");

        let Scan::Found(found) = find_token(&wire, QUIT_TOKEN, NAME_SEPARATOR) else {
            return Err(TestCaseError::fail("quit not found"));
        };
        prop_assert_eq!(found.name, name);
    });
}

#[test]
fn largest_frame_round_trips() {
    let frame = Frame::new("\u{e9}".repeat(MAX_PAYLOAD_UNITS));
    let wire = frame.to_bytes().expect("encode should succeed");

    let (decoded, _) = Frame::decode(&wire).expect("decode should succeed");
    assert_eq!(decoded.len(), MAX_PAYLOAD_UNITS);
}
