//! Driver for CarPlay/Android-Auto USB dongles
//!
//! Manages one dongle session end to end: transport binding, the session
//! handshake, a dedicated bulk read loop, periodic keep-alives, and an
//! event bus delivering decoded messages and link failures to the host.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --initialize--> Initialized --start--> Streaming
//!   ^                       ^                    |
//!   |                       +-------stop---------+
//!   +--teardown-- (any state, including Failed)
//! ```
//!
//! A driver that entered `Failed` must be torn down and re-initialized
//! before it can stream again.

pub mod driver;
pub mod error;
pub mod events;
mod reader;
pub mod state;
pub mod usb;

pub use driver::{DongleDriver, DriverTuning};
pub use error::{DriverError, Result};
pub use events::{DriverEvent, EventBus, EventKind, FailureReason, ListenerId};
pub use state::DriverState;
pub use usb::{KNOWN_DONGLES, UsbDongleTransport};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, riding through poisoning from a panicked thread
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
