//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire frames.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload does not fit in the four-digit length field.
    #[error("payload too large: {size} code units (max {max})")]
    PayloadTooLarge {
        /// Payload length in UTF-16 code units
        size: usize,
        /// Largest representable payload
        max: usize,
    },

    /// The buffer ends before the frame does.
    ///
    /// Not a failure of the peer: the caller keeps the bytes and retries once
    /// more data has arrived.
    #[error("insufficient data: need {needed} bytes, have {available}")]
    Incomplete {
        /// Total bytes the frame needs (lower bound while the length field is
        /// still being read)
        needed: usize,
        /// Bytes currently buffered
        available: usize,
    },

    /// The frame does not start with a decimal length field.
    #[error("missing length field")]
    MissingLength,

    /// The length field is not followed by `": "`.
    #[error("missing ': ' delimiter after length field")]
    MissingDelimiter,

    /// The length field has more digits than the protocol allows.
    #[error("length field exceeds {max_digits} digits")]
    LengthOverflow {
        /// Maximum digit count
        max_digits: usize,
    },

    /// Payload bytes are not valid UTF-16.
    #[error("payload is not valid UTF-16 text")]
    InvalidText,
}

impl ProtocolError {
    /// Whether this error only means "wait for more bytes".
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Incomplete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_display() {
        let err = ProtocolError::Incomplete { needed: 12, available: 4 };
        assert_eq!(err.to_string(), "insufficient data: need 12 bytes, have 4");
        assert!(err.is_incomplete());
    }

    #[test]
    fn structural_errors_are_not_incomplete() {
        assert!(!ProtocolError::MissingLength.is_incomplete());
        assert!(!ProtocolError::MissingDelimiter.is_incomplete());
        assert!(!ProtocolError::InvalidText.is_incomplete());
    }
}
