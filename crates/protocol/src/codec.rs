//! Frame codec for the dongle wire format
//!
//! Every frame is a fixed 16-byte header followed by `length` payload bytes.
//! All header fields are little-endian u32:
//!
//! ```text
//! [magic: 0x55AA55AA][length][type][type_check = type ^ 0xFFFFFFFF]
//! ```
//!
//! [`decode`] is incremental: callers keep a byte accumulator and retry with
//! more data whenever it reports [`DecodeOutcome::NeedMoreData`]. Buffered
//! bytes are never discarded by the codec itself; resynchronization after a
//! framing error is the caller's decision.

use crate::error::{ProtocolError, Result};
use crate::messages::Message;
use byteorder::{ByteOrder, LittleEndian};

/// Frame alignment sentinel at the start of every header
pub const MAGIC: u32 = 0x55AA_55AA;

/// Size of the fixed frame header in bytes
pub const HEADER_LEN: usize = 16;

/// Maximum accepted payload size; a larger declared length is treated as
/// stream desynchronization, not a giant frame
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Payload byte count following the header
    pub length: u32,
    /// Message type code (may be unknown to this driver)
    pub type_code: u32,
}

impl MessageHeader {
    /// Parse and validate a header from exactly [`HEADER_LEN`] bytes
    pub fn parse(buf: &[u8; HEADER_LEN]) -> Result<MessageHeader> {
        let magic = LittleEndian::read_u32(&buf[0..4]);
        if magic != MAGIC {
            return Err(ProtocolError::BadMagic {
                found: magic,
                expected: MAGIC,
            });
        }

        let length = LittleEndian::read_u32(&buf[4..8]);
        let type_code = LittleEndian::read_u32(&buf[8..12]);
        let type_check = LittleEndian::read_u32(&buf[12..16]);
        if type_check != !type_code {
            return Err(ProtocolError::BadTypeCheck {
                type_code,
                found: type_check,
            });
        }

        if length as usize > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: length as usize,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(MessageHeader { length, type_code })
    }

    /// Build header bytes for the given type code and payload length
    pub fn to_bytes(type_code: u32, length: u32) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        LittleEndian::write_u32(&mut buf[0..4], MAGIC);
        LittleEndian::write_u32(&mut buf[4..8], length);
        LittleEndian::write_u32(&mut buf[8..12], type_code);
        LittleEndian::write_u32(&mut buf[12..16], !type_code);
        buf
    }
}

/// Result of one incremental decode attempt
#[derive(Debug)]
pub enum DecodeOutcome {
    /// Not enough buffered bytes for a header, or for the declared payload;
    /// buffer more and retry
    NeedMoreData,
    /// One complete message; advance the buffer by `consumed` bytes
    Message { message: Message, consumed: usize },
    /// A structurally framed message of a known type whose payload failed to
    /// parse; advance by `consumed` and continue with the next frame
    Dropped {
        type_code: u32,
        consumed: usize,
        reason: ProtocolError,
    },
}

/// Attempt to decode one message from the front of `buf`
///
/// Returns `Err` only for framing errors (bad magic, bad type check, absurd
/// length); those mean the stream is misaligned and the caller should resync
/// by skipping a byte. Everything else is expressed as a [`DecodeOutcome`].
pub fn decode(buf: &[u8]) -> Result<DecodeOutcome> {
    if buf.len() < HEADER_LEN {
        return Ok(DecodeOutcome::NeedMoreData);
    }

    let header_bytes: &[u8; HEADER_LEN] = buf[..HEADER_LEN].try_into().expect("sized slice");
    let header = MessageHeader::parse(header_bytes)?;

    let total = HEADER_LEN + header.length as usize;
    if buf.len() < total {
        return Ok(DecodeOutcome::NeedMoreData);
    }

    let payload = &buf[HEADER_LEN..total];
    match Message::from_wire(header.type_code, payload) {
        Ok(message) => Ok(DecodeOutcome::Message {
            message,
            consumed: total,
        }),
        Err(reason) => Ok(DecodeOutcome::Dropped {
            type_code: header.type_code,
            consumed: total,
            reason,
        }),
    }
}

/// Encode a message into a complete frame (header + payload)
pub fn encode(message: &Message) -> Result<Vec<u8>> {
    let payload = message.wire_payload()?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&MessageHeader::to_bytes(
        message.type_code(),
        payload.len() as u32,
    ));
    frame.extend_from_slice(&payload);
    Ok(frame)
}
