//! Dongle driver lifecycle
//!
//! [`DongleDriver`] owns the transport, the read loop, and the heartbeat,
//! and exposes the Idle → Initialized → Streaming lifecycle. All outbound
//! traffic funnels through one write gate, so frames from the caller and
//! from the heartbeat thread never interleave on the wire.

use crate::error::{DriverError, Result};
use crate::events::{DriverEvent, EventBus, FailureReason};
use crate::reader;
use crate::state::DriverState;
use common::{DongleTransport, TransportError};
use protocol::{CommandId, ConnectionConfig, Message, MicSource, WifiBand, file_address};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Timing and resilience knobs, injectable for tests
#[derive(Debug, Clone)]
pub struct DriverTuning {
    /// Interval between keep-alive frames while streaming
    pub heartbeat_interval: Duration,
    /// Consecutive transport errors before the link is declared dead
    pub failure_threshold: u32,
    /// Bulk read timeout; expiry is idle, not an error
    pub read_timeout: Duration,
    /// Max single-byte skips while hunting for a frame boundary
    pub resync_budget: u32,
    /// Settle time between the handshake and the wifi-connect command
    pub wifi_connect_delay: Duration,
}

impl Default for DriverTuning {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(2),
            failure_threshold: 5,
            read_timeout: Duration::from_secs(1),
            resync_budget: 64,
            wifi_connect_delay: Duration::from_secs(1),
        }
    }
}

/// State shared between the driver handle and its worker threads
pub(crate) struct Shared {
    pub(crate) tuning: DriverTuning,
    pub(crate) events: EventBus,
    state: Mutex<DriverState>,
    /// Write gate: holding this lock is the only way to reach the transport's
    /// write side
    transport: Mutex<Option<Arc<dyn DongleTransport>>>,
    error_count: AtomicU32,
    failure_latched: AtomicBool,
    pub(crate) running: AtomicBool,
}

impl Shared {
    fn new(tuning: DriverTuning) -> Self {
        Self {
            tuning,
            events: EventBus::new(),
            state: Mutex::new(DriverState::Idle),
            transport: Mutex::new(None),
            error_count: AtomicU32::new(0),
            failure_latched: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> DriverState {
        *crate::lock(&self.state)
    }

    fn set_state(&self, state: DriverState) {
        *crate::lock(&self.state) = state;
    }

    /// Encode and write one frame, holding the write gate for the duration
    /// of the transfer only
    ///
    /// The gate must be released before the error is counted: crossing the
    /// failure threshold publishes the failure event, and listeners are
    /// allowed to call back into the write path.
    pub(crate) fn transmit(&self, message: &Message) -> Result<()> {
        let frame = protocol::encode(message)?;
        let written = {
            let guard = crate::lock(&self.transport);
            let transport = guard.as_ref().ok_or(DriverError::NotInitialized)?;
            transport.write(&frame)
        };
        match written {
            Ok(()) => {
                self.clear_errors();
                Ok(())
            }
            Err(err) => {
                warn!(kind = message.kind(), "write failed: {err}");
                self.note_transport_error();
                Err(err.into())
            }
        }
    }

    /// A transfer succeeded; the error streak is broken
    pub(crate) fn clear_errors(&self) {
        self.error_count.store(0, Ordering::SeqCst);
    }

    /// Count one transport error; returns true if this one crossed the
    /// failure threshold
    pub(crate) fn note_transport_error(&self) -> bool {
        let streak = self.error_count.fetch_add(1, Ordering::SeqCst) + 1;
        if streak >= self.tuning.failure_threshold {
            self.fail(FailureReason::TransportErrors {
                consecutive: streak,
            });
            true
        } else {
            false
        }
    }

    /// Declare the link dead: publish the failure (once) and latch `Failed`
    pub(crate) fn fail(&self, reason: FailureReason) {
        if self.failure_latched.swap(true, Ordering::SeqCst) {
            return;
        }
        error!("link failure: {reason}");
        self.events.publish(&DriverEvent::Failure(reason));
        self.set_state(DriverState::Failed);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Sleep up to `total`, waking early when the driver stops running
    pub(crate) fn sleep_while_running(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while self.running.load(Ordering::SeqCst) {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return;
            }
            thread::sleep(left.min(Duration::from_millis(50)));
        }
    }
}

/// Driver for a CarPlay/Android-Auto USB dongle
///
/// One driver manages one dongle session. Inbound messages and failures are
/// delivered through [`DongleDriver::events`]; outbound messages go through
/// [`DongleDriver::send`].
pub struct DongleDriver {
    shared: Arc<Shared>,
    read_thread: Option<JoinHandle<()>>,
    heartbeat_thread: Option<JoinHandle<()>>,
}

impl DongleDriver {
    pub fn new() -> Self {
        Self::with_tuning(DriverTuning::default())
    }

    pub fn with_tuning(tuning: DriverTuning) -> Self {
        Self {
            shared: Arc::new(Shared::new(tuning)),
            read_thread: None,
            heartbeat_thread: None,
        }
    }

    /// Event bus for subscribing to inbound messages and failures
    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    /// Current lifecycle state
    pub fn state(&self) -> DriverState {
        self.shared.state()
    }

    /// Bind a transport; legal only from `Idle`
    pub fn initialize(&mut self, transport: Arc<dyn DongleTransport>) -> Result<()> {
        let state = self.shared.state();
        if state != DriverState::Idle {
            return Err(DriverError::InvalidStateTransition {
                operation: "initialize",
                state,
            });
        }
        *crate::lock(&self.shared.transport) = Some(transport);
        self.shared.clear_errors();
        self.shared.failure_latched.store(false, Ordering::SeqCst);
        self.shared.set_state(DriverState::Initialized);
        debug!("transport bound");
        Ok(())
    }

    /// Send the session handshake and spawn the read and heartbeat threads
    pub fn start(&mut self, config: &ConnectionConfig) -> Result<()> {
        match self.shared.state() {
            DriverState::Initialized => {}
            DriverState::Idle | DriverState::Failed => return Err(DriverError::NotInitialized),
            state => {
                return Err(DriverError::InvalidStateTransition {
                    operation: "start",
                    state,
                });
            }
        }

        self.shared.clear_errors();
        self.handshake(config)?;

        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.set_state(DriverState::Streaming);

        let transport = crate::lock(&self.shared.transport)
            .as_ref()
            .ok_or(DriverError::NotInitialized)?
            .clone();
        let shared = self.shared.clone();
        self.read_thread = Some(
            thread::Builder::new()
                .name("carlink-read".to_string())
                .spawn(move || reader::run_read_loop(&shared, transport))
                .expect("Failed to spawn read thread"),
        );
        let shared = self.shared.clone();
        self.heartbeat_thread = Some(
            thread::Builder::new()
                .name("carlink-heartbeat".to_string())
                .spawn(move || run_heartbeat(&shared))
                .expect("Failed to spawn heartbeat thread"),
        );

        info!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            "streaming started"
        );
        Ok(())
    }

    /// Queue one outbound message; legal only while `Streaming`
    pub fn send(&self, message: &Message) -> Result<()> {
        let state = self.shared.state();
        if state != DriverState::Streaming {
            return Err(DriverError::NotStreaming);
        }
        self.shared.transmit(message)
    }

    /// Stop streaming and return to `Initialized`
    ///
    /// Idempotent from `Initialized`; any buffered undecoded bytes are
    /// discarded with the read loop.
    pub fn stop(&mut self) -> Result<()> {
        match self.shared.state() {
            DriverState::Streaming => {}
            DriverState::Initialized => return Ok(()),
            state => {
                return Err(DriverError::InvalidStateTransition {
                    operation: "stop",
                    state,
                });
            }
        }
        self.shared.set_state(DriverState::Stopping);
        self.join_workers();
        self.shared.set_state(DriverState::Initialized);
        info!("streaming stopped");
        Ok(())
    }

    /// Release everything and return to `Idle`; legal from any state
    pub fn teardown(&mut self) {
        self.join_workers();
        let transport = crate::lock(&self.shared.transport).take();
        if let Some(transport) = transport {
            transport.close();
        }
        self.shared.events.clear();
        self.shared.clear_errors();
        self.shared.failure_latched.store(false, Ordering::SeqCst);
        self.shared.set_state(DriverState::Idle);
        debug!("driver torn down");
    }

    fn join_workers(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.read_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.heartbeat_thread.take() {
            let _ = handle.join();
        }
    }

    /// The session negotiation the dongle expects before it starts
    /// projecting: configuration files, the open request, dongle settings,
    /// then the wifi bring-up commands
    fn handshake(&self, config: &ConnectionConfig) -> Result<()> {
        self.shared
            .transmit(&Message::file_u32(config.dpi, file_address::DPI))?;
        self.shared.transmit(&Message::open(config))?;
        self.shared
            .transmit(&Message::file_bool(config.night_mode, file_address::NIGHT_MODE))?;
        self.shared.transmit(&Message::file_u32(
            config.hand_drive.wire_value(),
            file_address::HAND_DRIVE_MODE,
        ))?;
        self.shared
            .transmit(&Message::file_bool(true, file_address::CHARGE_MODE))?;
        self.shared.transmit(&Message::box_name(&config.box_name))?;
        self.shared
            .transmit(&Message::box_settings(config, None))?;

        self.shared
            .transmit(&Message::Command(CommandId::WifiEnable))?;
        let band = match config.wifi_band {
            WifiBand::Band24 => CommandId::Wifi24g,
            WifiBand::Band5 => CommandId::Wifi5g,
        };
        self.shared.transmit(&Message::Command(band))?;
        let mic = match config.mic_source {
            MicSource::Os => CommandId::Mic,
            MicSource::Box => CommandId::BoxMic,
        };
        self.shared.transmit(&Message::Command(mic))?;
        let audio_transfer = if config.audio_transfer_mode {
            CommandId::AudioTransferOn
        } else {
            CommandId::AudioTransferOff
        };
        self.shared.transmit(&Message::Command(audio_transfer))?;

        if let Some(android_work_mode) = config.android_work_mode {
            self.shared.transmit(&Message::file_bool(
                android_work_mode,
                file_address::ANDROID_WORK_MODE,
            ))?;
        }

        // the dongle drops WifiConnect if it arrives before wifi is up
        thread::sleep(self.shared.tuning.wifi_connect_delay);
        self.shared
            .transmit(&Message::Command(CommandId::WifiConnect))?;
        Ok(())
    }
}

impl Default for DongleDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DongleDriver {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Keep-alive loop; one heartbeat per interval while streaming
fn run_heartbeat(shared: &Arc<Shared>) {
    debug!("heartbeat thread started");
    while shared.running.load(Ordering::SeqCst) {
        if shared.state() == DriverState::Streaming
            && let Err(err) = shared.transmit(&Message::Heartbeat)
        {
            match err {
                DriverError::Transport(TransportError::Disconnected) => {
                    warn!("heartbeat: dongle disconnected")
                }
                err => warn!("heartbeat failed: {err}"),
            }
        }
        shared.sleep_while_running(shared.tuning.heartbeat_interval);
    }
    debug!("heartbeat thread exiting");
}
