//! Wire protocol for CarPlay/Android-Auto USB dongles
//!
//! This crate defines the binary message protocol spoken over the dongle's
//! bulk endpoints: the 16-byte little-endian frame header, the full message
//! catalogue, and an incremental decoder suitable for a streaming read loop.
//!
//! # Example
//!
//! ```
//! use protocol::{CommandId, DecodeOutcome, Message, decode, encode};
//!
//! let bytes = encode(&Message::Command(CommandId::WifiEnable)).unwrap();
//! let DecodeOutcome::Message { message, consumed } = decode(&bytes).unwrap() else {
//!     panic!("complete frame");
//! };
//! assert_eq!(message, Message::Command(CommandId::WifiEnable));
//! assert_eq!(consumed, bytes.len());
//! ```
//!
//! # Incremental decoding
//!
//! [`decode`] never blocks and never consumes bytes on its own: it reports
//! [`DecodeOutcome::NeedMoreData`] until a whole frame is buffered, and the
//! caller advances its accumulator by the returned `consumed` count.
//! Unknown type codes come back as [`Message::Unknown`] so firmware
//! additions never break the stream.

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;

pub use codec::{DecodeOutcome, HEADER_LEN, MAGIC, MAX_PAYLOAD_SIZE, MessageHeader, decode, encode};
pub use error::{ProtocolError, Result};
pub use messages::{AudioBody, AudioPacket, MediaPayload, Message, OpenInfo, VideoFrame};
pub use types::{
    AudioCommand, AudioFormat, CommandId, ConnectionConfig, HandDrive, LogoType, MessageType,
    MicSource, MultiTouchAction, PhoneType, TouchAction, TouchPoint, WifiBand, file_address,
};
