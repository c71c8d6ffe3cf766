//! Driver error types

use crate::state::DriverState;
use thiserror::Error;

/// Driver-level errors
///
/// State-machine precondition violations surface synchronously from the
/// operation that violated them; transport/link failures past the retry
/// budget surface asynchronously through the `failure` event instead.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Operation is not legal in the current lifecycle state
    #[error("{operation} is not legal in state {state}")]
    InvalidStateTransition {
        operation: &'static str,
        state: DriverState,
    },

    /// `start` requires a prior successful `initialize`
    #[error("driver is not initialized")]
    NotInitialized,

    /// `send` requires an active streaming session
    #[error("driver is not streaming")]
    NotStreaming,

    /// Bulk transfer failure
    #[error("transport error: {0}")]
    Transport(#[from] common::TransportError),

    /// Message could not be encoded
    #[error(transparent)]
    Protocol(#[from] protocol::ProtocolError),

    /// libusb-level failure while opening/claiming the dongle
    #[error("usb error: {0}")]
    Usb(#[from] rusb::Error),

    /// No device with a known dongle vendor/product id is attached
    #[error("no supported dongle found")]
    NoDongle,

    /// The dongle interface lacks an expected bulk endpoint
    #[error("dongle interface has no {0}")]
    MissingEndpoint(&'static str),
}

/// Type alias for driver results
pub type Result<T> = std::result::Result<T, DriverError>;
