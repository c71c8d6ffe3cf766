//! Driver lifecycle states

/// Lifecycle state of a [`crate::DongleDriver`]
///
/// Exactly one state is live at a time; the driver operations are the only
/// legal way to transition. `Failed` is terminal until an explicit
/// `teardown` + `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No transport bound
    Idle,
    /// Transport bound, not streaming
    Initialized,
    /// Handshake sent, read loop and heartbeat active
    Streaming,
    /// `stop` in progress, worker threads winding down
    Stopping,
    /// Link declared dead; requires teardown before reuse
    Failed,
}

impl std::fmt::Display for DriverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverState::Idle => write!(f, "Idle"),
            DriverState::Initialized => write!(f, "Initialized"),
            DriverState::Streaming => write!(f, "Streaming"),
            DriverState::Stopping => write!(f, "Stopping"),
            DriverState::Failed => write!(f, "Failed"),
        }
    }
}
