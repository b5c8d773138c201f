//! Fuzz target for incremental frame decoding
//!
//! Feeds arbitrary bytes to a `FrameBuffer` in arbitrary chunk sizes, the
//! way a client reads from its socket.
//!
//! # Invariants
//!
//! - Decoding never panics; malformed input only produces an error
//! - Chunking does not change the decoded frames
//! - Every decoded frame survives an encode and decode unchanged

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use signalbox_proto::{Frame, FrameBuffer};

#[derive(Debug, Arbitrary)]
struct Stream {
    bytes: Vec<u8>,
    chunks: Vec<u8>,
}

/// Drain every decodable frame; stop at the first structural error.
fn drain(buffer: &mut FrameBuffer, out: &mut Vec<Frame>) -> bool {
    loop {
        match buffer.next_frame() {
            Ok(Some(frame)) => out.push(frame),
            Ok(None) => return true,
            Err(_) => return false,
        }
    }
}

fuzz_target!(|stream: Stream| {
    let mut whole = FrameBuffer::new();
    whole.extend(&stream.bytes);
    let mut expected = Vec::new();
    let whole_ok = drain(&mut whole, &mut expected);

    let mut chunked = FrameBuffer::new();
    let mut frames = Vec::new();
    let mut chunked_ok = true;
    let mut rest = stream.bytes.as_slice();
    let mut sizes = stream.chunks.iter().copied().cycle();
    while !rest.is_empty() && chunked_ok {
        let size = usize::from(sizes.next().unwrap_or(u8::MAX)).clamp(1, rest.len());
        let (chunk, tail) = rest.split_at(size);
        chunked.extend(chunk);
        rest = tail;
        chunked_ok = drain(&mut chunked, &mut frames);
    }

    assert_eq!(whole_ok, chunked_ok);
    assert_eq!(frames, expected);

    for frame in &expected {
        let Ok(encoded) = frame.to_bytes() else {
            panic!("decoded frame failed to re-encode");
        };
        let Ok((decoded, consumed)) = Frame::decode(&encoded) else {
            panic!("re-encoded frame failed to decode");
        };
        assert_eq!(&decoded, frame);
        assert_eq!(consumed, encoded.len());
    }
});
