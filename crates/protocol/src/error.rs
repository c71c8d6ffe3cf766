//! Protocol error types

use thiserror::Error;

/// Protocol-level errors
///
/// Framing errors ([`BadMagic`](ProtocolError::BadMagic),
/// [`BadTypeCheck`](ProtocolError::BadTypeCheck),
/// [`PayloadTooLarge`](ProtocolError::PayloadTooLarge)) indicate stream
/// desynchronization and are recovered by the reader via byte-wise resync.
/// Payload errors only invalidate the single frame they occur in.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Header magic did not match the expected sentinel
    #[error("bad header magic: {found:#010x} (expected {expected:#010x})")]
    BadMagic { found: u32, expected: u32 },

    /// Header type-check word did not match the complement of the type code
    #[error("bad header type check for type {type_code:#x}: {found:#010x}")]
    BadTypeCheck { type_code: u32, found: u32 },

    /// Declared payload length exceeds the maximum allowed size
    #[error("payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Payload shorter than the fixed layout of its message type requires
    #[error("truncated {kind} payload: needed {needed} bytes, got {got}")]
    TruncatedPayload {
        kind: &'static str,
        needed: usize,
        got: usize,
    },

    /// A field of a known message type carried an unrepresentable value
    #[error("invalid {field} value {value} in {kind} payload")]
    InvalidField {
        kind: &'static str,
        field: &'static str,
        value: u32,
    },

    /// String payload was not valid UTF-8
    #[error("invalid string in {kind} payload: {source}")]
    InvalidString {
        kind: &'static str,
        #[source]
        source: std::str::Utf8Error,
    },

    /// JSON payload failed to parse or serialize
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// Attempted to encode a message variant the driver only receives
    #[error("{kind} messages are receive-only and cannot be encoded")]
    NotEncodable { kind: &'static str },
}

impl ProtocolError {
    /// Whether this error means the byte stream itself is misaligned
    ///
    /// Framing errors are recovered by skipping bytes until a valid header is
    /// found again; all other errors consume exactly one frame.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::BadMagic { .. }
                | ProtocolError::BadTypeCheck { .. }
                | ProtocolError::PayloadTooLarge { .. }
        )
    }
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::BadMagic {
            found: 0xdeadbeef,
            expected: 0x55aa55aa,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("0xdeadbeef"));
        assert!(msg.contains("0x55aa55aa"));
    }

    #[test]
    fn test_framing_classification() {
        assert!(
            ProtocolError::BadMagic {
                found: 0,
                expected: 1
            }
            .is_framing()
        );
        assert!(
            ProtocolError::PayloadTooLarge { size: 1, max: 0 }.is_framing()
        );
        assert!(
            !ProtocolError::TruncatedPayload {
                kind: "video",
                needed: 20,
                got: 4
            }
            .is_framing()
        );
        assert!(!ProtocolError::NotEncodable { kind: "video" }.is_framing());
    }
}
