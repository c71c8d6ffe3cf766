//! Common utilities for carlink
//!
//! Shared plumbing between the driver and the host binary: the transport
//! abstraction over USB bulk endpoints, logging setup, error types, stream
//! statistics, and test helpers.

pub mod error;
pub mod logging;
pub mod stats;
pub mod test_utils;
pub mod transport;

pub use error::{Error, Result};
pub use logging::setup_logging;
pub use stats::{StatsSnapshot, StreamStats};
pub use transport::{DongleTransport, ReadOutcome, TransportError};
