//! Transport abstraction over the dongle's bulk endpoints
//!
//! The driver never talks to USB directly; it holds a [`DongleTransport`]
//! and treats it as an opaque byte pipe. The production implementation wraps
//! a claimed rusb device handle; tests substitute a scripted mock.

use std::time::Duration;
use thiserror::Error;

/// Transport-level failures
///
/// A read timeout is not an error (see [`ReadOutcome::TimedOut`]); these
/// variants all count against the driver's consecutive-failure budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The device is gone (unplugged, reset, or claimed elsewhere)
    #[error("device disconnected")]
    Disconnected,

    /// Endpoint stall or other bulk transfer failure
    #[error("bulk transfer error: {0}")]
    Io(String),
}

/// Result of one bounded-timeout bulk read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes arrived; may hold any number of whole or partial frames
    Data(Vec<u8>),
    /// Nothing arrived within the timeout; the caller just reads again
    TimedOut,
}

/// Blocking bulk read/write handle bound to one dongle
///
/// Methods take `&self` so one handle can be shared between the reader
/// thread and writers; implementations must be internally safe for that
/// (rusb transfer calls are). Write serialization is the driver's job, not
/// the transport's.
pub trait DongleTransport: Send + Sync {
    /// Bulk-read whatever the device has, waiting at most `timeout`
    fn read(&self, timeout: Duration) -> Result<ReadOutcome, TransportError>;

    /// Bulk-write the full buffer to the device
    fn write(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Release the device; further reads/writes may fail
    fn close(&self) {}
}
