//! Length-prefixed text frames.
//!
//! Layout on the wire (UTF-16LE):
//! `[" " | ","]? <decimal length>": " <payload>`
//!
//! The length counts UTF-16 code units of the payload, not bytes. The length
//! field has no fixed width and no terminator other than `": "`, which caps
//! it at [`MAX_LENGTH_DIGITS`] digits.

use std::ops::Range;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{
    errors::{ProtocolError, Result},
    text::{self, CODE_UNIT_SIZE},
};

/// Largest number of decimal digits in a length field.
pub const MAX_LENGTH_DIGITS: usize = 4;

/// Largest payload, in UTF-16 code units, a four-digit length can describe.
pub const MAX_PAYLOAD_UNITS: usize = 9999;

const DELIMITER: [u8; 2] = [b':', b' '];

/// One unit of wire traffic.
///
/// # Invariants
///
/// - The encoded length field always equals the payload's UTF-16 code-unit
///   count; it is derived at encode time and never stored.
/// - [`Frame::decode`] reconstructs exactly that many code units or fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    payload: String,
    padded: bool,
}

impl Frame {
    /// Frame with no leading separator (`10: SERVER YOU`).
    pub fn new(payload: impl Into<String>) -> Self {
        Self { payload: payload.into(), padded: false }
    }

    /// Frame with a leading blank (` 21: SERVER WhoCanBeServer`), the form the
    /// relay uses for its own announcements.
    pub fn padded(payload: impl Into<String>) -> Self {
        Self { payload: payload.into(), padded: true }
    }

    /// Payload text.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Consume the frame, returning its payload.
    pub fn into_payload(self) -> String {
        self.payload
    }

    /// Whether the frame carries a leading separator.
    pub fn is_padded(&self) -> bool {
        self.padded
    }

    /// Payload length in UTF-16 code units (the value of the length field).
    pub fn len(&self) -> usize {
        text::code_units(&self.payload)
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encode the frame into `dst`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the payload needs more than
    ///   [`MAX_LENGTH_DIGITS`] digits to describe
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let length = self.len();
        if length > MAX_PAYLOAD_UNITS {
            return Err(ProtocolError::PayloadTooLarge { size: length, max: MAX_PAYLOAD_UNITS });
        }

        let prefix = if self.padded { format!(" {length}: ") } else { format!("{length}: ") };
        text::encode_into(&prefix, dst);
        text::encode_into(&self.payload, dst);
        Ok(())
    }

    /// Encode the frame into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity((self.payload.len() + 8) * CODE_UNIT_SIZE);
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode one frame from the start of `bytes`.
    ///
    /// Returns the frame and the number of bytes it occupied. Trailing bytes
    /// are left alone.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Incomplete` if `bytes` ends before the frame does; no
    ///   partial payload is ever returned
    /// - `ProtocolError::MissingLength`, `MissingDelimiter` or `LengthOverflow`
    ///   if the bytes do not follow the frame grammar
    /// - `ProtocolError::InvalidText` if the payload is not valid UTF-16
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let layout = Layout::measure(bytes)?;
        let payload = text::decode(&bytes[layout.payload.clone()])?;
        Ok((Self { payload, padded: layout.padded }, layout.payload.end))
    }
}

/// Where a frame's pieces sit, in bytes, before the payload is decoded.
struct Layout {
    padded: bool,
    payload: Range<usize>,
}

impl Layout {
    fn measure(bytes: &[u8]) -> Result<Self> {
        let available = bytes.len();
        let unit = |index: usize| {
            let at = index * CODE_UNIT_SIZE;
            bytes.get(at..at + CODE_UNIT_SIZE).map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        };

        let Some(first) = unit(0) else {
            return Err(incomplete(1, available));
        };
        let padded = first == u16::from(b' ') || first == u16::from(b',');
        let digits_start = usize::from(padded);

        let mut cursor = digits_start;
        let mut length = 0usize;
        loop {
            let Some(current) = unit(cursor) else {
                return Err(incomplete(cursor + 1, available));
            };
            let Some(digit) = u8::try_from(current).ok().filter(u8::is_ascii_digit) else {
                break;
            };
            if cursor - digits_start == MAX_LENGTH_DIGITS {
                return Err(ProtocolError::LengthOverflow { max_digits: MAX_LENGTH_DIGITS });
            }
            length = length * 10 + usize::from(digit - b'0');
            cursor += 1;
        }
        if cursor == digits_start {
            return Err(ProtocolError::MissingLength);
        }

        for expected in DELIMITER {
            let Some(current) = unit(cursor) else {
                return Err(incomplete(cursor + 1, available));
            };
            if current != u16::from(expected) {
                return Err(ProtocolError::MissingDelimiter);
            }
            cursor += 1;
        }

        let end = cursor + length;
        if end * CODE_UNIT_SIZE > available {
            return Err(incomplete(end, available));
        }

        Ok(Self { padded, payload: cursor * CODE_UNIT_SIZE..end * CODE_UNIT_SIZE })
    }
}

/// Byte length of the run of whole frames at the start of `bytes`.
///
/// Stops in front of the first frame that is not fully buffered. Payloads are
/// not decoded. Once the bytes stop following the frame grammar no boundary
/// can be trusted, and every whole code unit is reported instead.
pub fn whole_frames(bytes: &[u8]) -> usize {
    let mut at = 0;
    while at < bytes.len() {
        match Layout::measure(&bytes[at..]) {
            Ok(layout) => at += layout.payload.end,
            Err(e) if e.is_incomplete() => return at,
            Err(_) => return bytes.len() - bytes.len() % CODE_UNIT_SIZE,
        }
    }
    at
}

fn incomplete(units: usize, available: usize) -> ProtocolError {
    ProtocolError::Incomplete { needed: units * CODE_UNIT_SIZE, available }
}

/// Incremental decoder for a byte stream.
///
/// Bytes arrive in arbitrary chunks; whole frames come out. A frame is only
/// removed from the buffer once all of it has arrived.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next complete frame, or `None` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Any structural [`ProtocolError`]. The offending bytes stay buffered;
    /// the stream cannot be resynchronised after such an error.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match Frame::decode(&self.buf) {
            Ok((frame, consumed)) => {
                self.buf.advance(consumed);
                Ok(Some(frame))
            },
            Err(e) if e.is_incomplete() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Bytes buffered but not yet returned as frames.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
